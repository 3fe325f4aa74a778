use serde::{Deserialize, Serialize};

/// Channels a server has assigned to bot features (`guild_configs/{guild}`)
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct GuildConfig {
    /// Ayumi answers every message here
    pub ayumi_channel_id: Option<String>,
    /// Where /immersion is expected to be used
    pub immersion_channel_id: Option<String>,
    /// Anime news posts
    pub news_channel_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, poise::ChoiceParameter)]
pub enum ChannelKind {
    #[name = "Ayumi chat"]
    Ayumi,
    #[name = "Immersion logging"]
    Immersion,
    #[name = "Anime news"]
    News,
}

impl GuildConfig {
    pub fn channel(&self, kind: ChannelKind) -> Option<&str> {
        match kind {
            ChannelKind::Ayumi => self.ayumi_channel_id.as_deref(),
            ChannelKind::Immersion => self.immersion_channel_id.as_deref(),
            ChannelKind::News => self.news_channel_id.as_deref(),
        }
    }

    pub fn set_channel(&mut self, kind: ChannelKind, channel_id: u64) {
        let slot = match kind {
            ChannelKind::Ayumi => &mut self.ayumi_channel_id,
            ChannelKind::Immersion => &mut self.immersion_channel_id,
            ChannelKind::News => &mut self.news_channel_id,
        };
        *slot = Some(channel_id.to_string());
    }

    pub fn is_ayumi_channel(&self, channel_id: u64) -> bool {
        self.ayumi_channel_id.as_deref() == Some(channel_id.to_string().as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_read_channels() {
        let mut config = GuildConfig::default();
        config.set_channel(ChannelKind::Ayumi, 123);
        config.set_channel(ChannelKind::News, 456);

        assert!(config.is_ayumi_channel(123));
        assert!(!config.is_ayumi_channel(456));
        assert_eq!(config.channel(ChannelKind::News), Some("456"));
        assert_eq!(config.channel(ChannelKind::Immersion), None);

        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["ayumiChannelId"], "123");
    }
}
