//! Channel kinds and what each kind can receive.

use std::fmt;

/// Channel kind, fixed when a channel is first wrapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    GuildText,
    Direct,
    Group,
    GuildVoice,
    GuildCategory,
    /// Any other guild channel (announcement, thread, forum...).
    GuildOther,
    Unknown,
}

/// Something an outbound request needs from its target channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Text,
    Attachment,
    Embed,
}

impl Capability {
    pub fn as_str(self) -> &'static str {
        match self {
            Capability::Text => "text",
            Capability::Attachment => "attachment",
            Capability::Embed => "embed",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ChannelKind {
    /// Maps the Discord channel type code.
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => ChannelKind::GuildText,
            1 => ChannelKind::Direct,
            2 | 13 => ChannelKind::GuildVoice,
            3 => ChannelKind::Group,
            4 => ChannelKind::GuildCategory,
            5 | 10 | 11 | 12 | 14 | 15 | 16 => ChannelKind::GuildOther,
            _ => ChannelKind::Unknown,
        }
    }

    pub fn is_guild(self) -> bool {
        matches!(
            self,
            ChannelKind::GuildText
                | ChannelKind::GuildVoice
                | ChannelKind::GuildCategory
                | ChannelKind::GuildOther
        )
    }

    pub fn supports(self, capability: Capability) -> bool {
        match capability {
            Capability::Text | Capability::Attachment => matches!(
                self,
                ChannelKind::GuildText | ChannelKind::Group | ChannelKind::Direct
            ),
            Capability::Embed => self == ChannelKind::GuildText,
        }
    }
}
