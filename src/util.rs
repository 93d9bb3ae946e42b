// Basically does same as anyhow::ensure, returns the error if the condition
// doesn't hold
macro_rules! ensure {
    ($cond:expr, $err:expr) => {
        if !($cond) {
            return Err($err);
        }
    };
}

pub(crate) use ensure;
