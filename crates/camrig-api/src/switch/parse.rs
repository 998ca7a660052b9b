// ── CLI text handling ──
//
// Prompt detection, telnet option refusal and the MAC table scraper.
// Kept free of I/O so the session code stays about sequencing.

use super::PortMac;

const IAC: u8 = 255;
const DONT: u8 = 254;
const DO: u8 = 253;
const WONT: u8 = 252;
const WILL: u8 = 251;
const SB: u8 = 250;
const SE: u8 = 240;

const MORE_MARKER: &str = "Press any key to continue";

/// What the switch is currently waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Prompt {
    User,
    Password,
    /// A `(Q to quit)` pager inside long output.
    More,
    /// `name>` (user exec) or `name#` / `name(config)#` (privileged).
    Cli,
}

/// Inspect the tail of accumulated output for a prompt.
pub(crate) fn detect_prompt(text: &str) -> Option<Prompt> {
    let last = text.rsplit(['\n', '\r']).next().unwrap_or(text).trim_end();
    if last.contains(MORE_MARKER) {
        return Some(Prompt::More);
    }
    if last.ends_with("User:") || last.ends_with("Username:") || last.ends_with("login:") {
        return Some(Prompt::User);
    }
    if last.ends_with("Password:") {
        return Some(Prompt::Password);
    }
    if !last.contains(' ') && (last.ends_with('#') || last.ends_with('>')) && last.len() > 1 {
        return Some(Prompt::Cli);
    }
    None
}

/// Where the option filter is inside an IAC sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum IacState {
    #[default]
    Data,
    Iac,
    /// Waiting for the option byte after `DO`/`WILL`/`DONT`/`WONT`.
    Option(u8),
    Subnegotiation,
    SubnegotiationIac,
}

/// Strips telnet negotiation from the byte stream.
///
/// Every `DO` is answered with `WONT` and every `WILL` with `DONT`, which
/// leaves the line in plain NVT mode. State carries over between calls to
/// [`feed`](Self::feed), so a sequence split across reads is still removed.
#[derive(Debug, Default)]
pub(crate) struct TelnetFilter {
    state: IacState,
}

impl TelnetFilter {
    /// Filter one chunk, queueing refusals into `replies`.
    pub(crate) fn feed(&mut self, input: &[u8], replies: &mut Vec<u8>) -> Vec<u8> {
        let mut out = Vec::with_capacity(input.len());
        for &byte in input {
            self.state = match (self.state, byte) {
                (IacState::Data, IAC) => IacState::Iac,
                (IacState::Data, _) => {
                    out.push(byte);
                    IacState::Data
                }
                (IacState::Iac, IAC) => {
                    out.push(IAC);
                    IacState::Data
                }
                (IacState::Iac, DO | WILL | DONT | WONT) => IacState::Option(byte),
                (IacState::Iac, SB) => IacState::Subnegotiation,
                (IacState::Iac, _) => IacState::Data,
                (IacState::Option(verb), opt) => {
                    match verb {
                        DO => replies.extend_from_slice(&[IAC, WONT, opt]),
                        WILL => replies.extend_from_slice(&[IAC, DONT, opt]),
                        _ => {}
                    }
                    IacState::Data
                }
                (IacState::Subnegotiation, IAC) => IacState::SubnegotiationIac,
                (IacState::Subnegotiation, _) => IacState::Subnegotiation,
                (IacState::SubnegotiationIac, SE) => IacState::Data,
                (IacState::SubnegotiationIac, _) => IacState::Subnegotiation,
            };
        }
        out
    }
}

/// Drop the pager marker so it does not end up in parsed output.
pub(crate) fn remove_more_marker(text: &mut String) {
    if let Some(idx) = text.rfind(MORE_MARKER) {
        let line_start = text[..idx].rfind('\n').map_or(0, |i| i + 1);
        text.truncate(line_start);
    }
}

/// Strip the echoed command line and the trailing prompt from a reply.
pub(crate) fn command_output(raw: &str) -> String {
    let mut lines: Vec<&str> = raw.lines().map(|l| l.trim_end_matches('\r')).collect();
    if !lines.is_empty() {
        lines.remove(0);
    }
    if lines
        .last()
        .is_some_and(|l| detect_prompt(l) == Some(Prompt::Cli))
    {
        lines.pop();
    }
    lines.join("\n")
}

/// The first error line the CLI printed, if any.
pub(crate) fn error_line(output: &str) -> Option<&str> {
    output.lines().map(str::trim).find(|line| {
        line.starts_with("Error")
            || line.starts_with('%')
            || line.starts_with("Bad command")
            || line.starts_with("Invalid")
    })
}

/// CLI interface name for a zero-based port index.
pub fn port_interface(index: u16) -> String {
    format!("interface gigabitEthernet 1/0/{}", u32::from(index) + 1)
}

fn looks_like_mac(token: &str) -> bool {
    let bytes = token.as_bytes();
    bytes.len() == 17
        && bytes.iter().enumerate().all(|(i, b)| {
            if i % 3 == 2 {
                *b == b':' || *b == b'-'
            } else {
                b.is_ascii_hexdigit()
            }
        })
}

/// `Gi1/0/3` or `1/0/3` → zero-based `2`.
fn port_index(token: &str) -> Option<u16> {
    if !token.contains('/') {
        return None;
    }
    let last = token.rsplit('/').next()?;
    let number: u16 = last.parse().ok()?;
    number.checked_sub(1)
}

/// Scrape `show mac address-table` output into rows.
///
/// Lines without both a MAC and a slot/port token (headers, LAG members,
/// the CPU entry) are skipped.
pub fn mac_table(output: &str) -> Vec<PortMac> {
    output
        .lines()
        .filter_map(|line| {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            let mac = tokens.iter().find(|t| looks_like_mac(t))?;
            let port = tokens.iter().find_map(|t| port_index(t))?;
            Some(PortMac {
                port,
                mac: (*mac).to_owned(),
            })
        })
        .collect()
}
