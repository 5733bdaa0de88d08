//! Outbound command lines, without the line terminator.

pub fn nick(nick: &str) -> String {
    format!("NICK {nick}")
}

pub fn user(nick: &str, realname: &str) -> String {
    format!("USER {nick} 0 * :{realname}")
}

pub fn join(channel: &str) -> String {
    format!("JOIN {channel}")
}

/// Keep-alive reply. `payload` is written as-is.
pub fn pong(payload: &str) -> String {
    format!("PONG {payload}")
}

pub fn privmsg(target: &str, text: &str) -> String {
    format!("PRIVMSG {target} :{text}")
}
