use crate::kinesis::{Kinesis, Message, CHANNEL};
use std::{thread, time::Duration};
use tracing::debug;

/// The queue stayed empty for longer than the timeout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct TimedOut;

// Blocks until a completion message is dequeued or the timeout elapsed.
//
// Every look at an empty queue is followed by a sleep of `queue_poll`, the
// number of sleeps so far is what the timeout is checked against. So this never
// sleeps longer than timeout + queue_poll in total. Exactly one message is
// dequeued per look at a non-empty queue, messages that aren't completions are
// dropped without resetting the count. A look where the dequeue comes back empty
// is treated like a look at an empty queue.
pub(super) fn wait_for_completion<K: Kinesis>(
    hardware: &mut K,
    serial: &str,
    queue_poll: Duration,
    timeout_ms: u64,
) -> Result<Message, TimedOut> {
    // a zero step would never reach the timeout
    let step = queue_poll.max(Duration::from_millis(1));
    let step_ms = step.as_millis() as u64;
    let mut counter: u64 = 0;
    loop {
        if hardware.message_queue_size(serial, CHANNEL) > 0 {
            match hardware.next_message(serial, CHANNEL) {
                Some(message) if message.is_completion() => return Ok(message),
                Some(message) => {
                    debug!(?message, "ignoring message while waiting for completion");
                    continue;
                }
                // counts as an empty look
                None => debug!("message queue not empty but nothing could be dequeued"),
            }
        }
        if counter.saturating_mul(step_ms) > timeout_ms {
            return Err(TimedOut);
        }
        thread::sleep(step);
        counter += 1;
    }
}
