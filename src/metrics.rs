//! Counters for operator attachments.

use metrics::counter;

use crate::operator::AttachmentState;

pub(crate) fn record_attachment(operator: &str) {
    counter!("streamlift_attachments_total", "operator" => operator.to_owned()).increment(1);
}

pub(crate) fn record_forwarded(operator: &str) {
    counter!("streamlift_items_forwarded_total", "operator" => operator.to_owned()).increment(1);
}

pub(crate) fn record_outcome(operator: &str, state: AttachmentState) {
    counter!(
        "streamlift_attachments_terminated_total",
        "operator" => operator.to_owned(),
        "outcome" => state.as_str()
    )
    .increment(1);
}
