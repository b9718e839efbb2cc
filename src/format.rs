use crate::model::Message;

const DISPLAY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Render a message as the two-line text body sent to the chat.
///
/// An unparseable `create_time` is shown as-is.
pub fn format_message(msg: &Message) -> String {
    let when = msg
        .created_at()
        .map(|t| t.format(DISPLAY_TIME_FORMAT).to_string())
        .unwrap_or_else(|| msg.create_time.clone());
    format!("时间: {}\n内容: {}", when, msg.text)
}
