use nom::{
    bytes::complete::{tag, take_till},
    combinator::rest,
    multi::separated_list0,
    sequence::terminated,
    IResult,
};

// everything up to the next ',' or the NUL padding of the C buffer
fn entry(s: &str) -> IResult<&str, &str> {
    take_till(|c: char| c == ',' || c == '\0')(s)
}

fn entries(s: &str) -> IResult<&str, Vec<&str>> {
    terminated(separated_list0(tag(","), entry), rest)(s)
}

/// Splits the result of `TLI_GetDeviceListByTypeExt` into serial numbers
///
/// Entries are trimmed, empty ones are skipped. Anything after the first NUL is
/// ignored.
///
/// # Examples
/// ```
/// # use fw103h_filter_wheel::kinesis::parse_serial_list;
/// let serials = parse_serial_list("40154488,,40100001,\0\0");
/// assert_eq!(serials, vec!["40154488", "40100001"]);
/// ```
pub fn parse_serial_list(s: &str) -> Vec<&str> {
    // every input is a valid list, an entry may be empty
    let list = entries(s).map_or_else(|_| Vec::new(), |(_, list)| list);
    list.into_iter()
        .map(str::trim)
        .filter(|serial| !serial.is_empty())
        .collect()
}
