use logicprobe_foundation::ProtocolError;

/// One decoded terminated command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `i` — identify; answered with the device/version string.
    Identify,
    /// `R<n>` — set the sample rate in Hz.
    SetRate(u32),
    /// `L<n>` — set the bounded sample count.
    SetLimit(u64),
    /// `A<0|1><ch>` — disable/enable one analog channel.
    EnableAnalog { channel: u8, enabled: bool },
    /// `D<0|1><ch>` — disable/enable one digital channel.
    EnableDigital { channel: u8, enabled: bool },
    /// `a<ch>` — query the analog scale/offset for a channel.
    AnalogScale { channel: u8 },
    /// `F` — start a bounded run.
    RunFixed,
    /// `C` — start a continuous run.
    RunContinuous,
}

impl Command {
    /// Decode one command line, terminator already stripped.
    pub fn parse(line: &[u8]) -> Result<Self, ProtocolError> {
        let malformed = || ProtocolError::Malformed(String::from_utf8_lossy(line).into_owned());
        let (&verb, rest) = line.split_first().ok_or_else(malformed)?;
        match verb {
            b'i' if rest.is_empty() => Ok(Command::Identify),
            b'F' if rest.is_empty() => Ok(Command::RunFixed),
            b'C' if rest.is_empty() => Ok(Command::RunContinuous),
            b'R' => parse_number(rest)
                .and_then(|v| u32::try_from(v).ok())
                .map(Command::SetRate)
                .ok_or_else(malformed),
            b'L' => parse_number(rest)
                .map(Command::SetLimit)
                .ok_or_else(malformed),
            b'A' => parse_enable(rest)
                .map(|(enabled, channel)| Command::EnableAnalog { channel, enabled })
                .ok_or_else(malformed),
            b'D' => parse_enable(rest)
                .map(|(enabled, channel)| Command::EnableDigital { channel, enabled })
                .ok_or_else(malformed),
            b'a' => match rest {
                [ch @ b'0'..=b'9'] => Ok(Command::AnalogScale { channel: ch - b'0' }),
                _ => Err(malformed()),
            },
            _ => Err(malformed()),
        }
    }
}

fn parse_number(bytes: &[u8]) -> Option<u64> {
    if bytes.is_empty() || !bytes.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(bytes).ok()?.parse().ok()
}

fn parse_enable(rest: &[u8]) -> Option<(bool, u8)> {
    match rest {
        [state @ (b'0' | b'1'), ch @ b'0'..=b'9'] => Some((*state == b'1', ch - b'0')),
        _ => None,
    }
}
