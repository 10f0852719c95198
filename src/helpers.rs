use crate::session::ControlWriter;
use colored::Colorize;
use tokio::io::AsyncWriteExt;

/// Formats a control-channel reply: status line followed by a blank line.
pub fn format_reply(code: u16, message: &str, ansi: bool) -> String {
    if !ansi {
        return format!("{} {}\r\n\r\n", code, message);
    }
    let code_str = code.to_string();
    let colored_code = match code {
        100..=299 => code_str.green(),
        300..=399 | 435 => code_str.yellow(),
        _ => code_str.red(),
    };
    format!("{} {}\r\n\r\n", colored_code, message)
}

/// Sends a response to the client.
pub async fn send_response(writer: &ControlWriter, message: &[u8]) -> Result<(), std::io::Error> {
    let mut writer = writer.lock().await;
    writer.write_all(message).await?;
    writer.flush().await?;
    Ok(())
}

/// Splits `(a.b.c.d, port)` into the six numbers of a 227 reply.
pub fn pasv_tuple(ip: std::net::Ipv4Addr, port: u16) -> [u16; 6] {
    let [a, b, c, d] = ip.octets();
    [a.into(), b.into(), c.into(), d.into(), port / 256, port % 256]
}
