use serde::{Deserialize, Serialize};

use crate::id::CharacterId;

/// How chatty a character is in the phone scene. Drives how many separate
/// messages a single reply is asked to fan out into.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ChatFrequency {
    High,
    #[default]
    Medium,
    Low,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Gender {
    Male,
    Female,
    #[default]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub id: CharacterId,
    pub name: String,
    pub avatar: String,
    pub standee_image: String,
    pub personality: String,
    pub appearance: String,
    pub speaking_style: String,
    pub relationship: String,
    pub background_story: String,
    #[serde(default)]
    pub chat_frequency: ChatFrequency,
    #[serde(default)]
    pub gender: Gender,
    #[serde(default)]
    pub custom_chat_background: Option<String>,
    /// Timestamped summaries appended by the memory compactor.
    #[serde(default)]
    pub memory: Vec<String>,
}

impl Character {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: CharacterId::new(),
            name: name.into(),
            avatar: String::new(),
            standee_image: String::new(),
            personality: String::new(),
            appearance: String::new(),
            speaking_style: String::new(),
            relationship: String::new(),
            background_story: String::new(),
            chat_frequency: ChatFrequency::default(),
            gender: Gender::default(),
            custom_chat_background: None,
            memory: Vec::new(),
        }
    }

    pub fn with_frequency(mut self, frequency: ChatFrequency) -> Self {
        self.chat_frequency = frequency;
        self
    }

    pub fn with_personality(mut self, personality: impl Into<String>) -> Self {
        self.personality = personality.into();
        self
    }

    /// Replace every profile field with `profile`'s, keeping id and memory.
    pub fn apply_profile(&mut self, profile: Character) {
        let id = std::mem::take(&mut self.id);
        let memory = std::mem::take(&mut self.memory);
        *self = Character {
            id,
            memory,
            ..profile
        };
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: String,
    pub avatar: String,
    pub standee_image: String,
    pub personality: String,
    pub appearance: String,
    pub background_story: String,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            name: "我".to_string(),
            avatar: "https://picsum.photos/seed/me/200/200".to_string(),
            standee_image: "https://picsum.photos/seed/mestand/400/800".to_string(),
            personality: "温柔，随和，富有同情心。".to_string(),
            appearance: "身材匀称，眼神清澈。".to_string(),
            background_story: "一名普通的大学生，正在探索这个世界。".to_string(),
        }
    }
}

/// The roster a fresh session starts with.
pub fn default_roster() -> Vec<Character> {
    vec![Character {
        id: CharacterId::from("1"),
        name: "陈云川".to_string(),
        avatar: "https://files.catbox.moe/8s12f7.jpeg".to_string(),
        standee_image: "https://files.catbox.moe/2l76hv.png".to_string(),
        personality: "白手起家，在S市手握半城命脉。30岁，性格强势霸道，但对你极尽宠爱。"
            .to_string(),
        appearance: "198cm高大身材，肩宽腰窄，五官帅气硬朗，通常穿着解开扣子的衬衫。".to_string(),
        speaking_style: "粗犷直白，心直口快，有话直说不遮掩。".to_string(),
        relationship: "合法丈夫".to_string(),
        background_story: "半年前，你父亲因欠下巨额债务带你去了他的别墅。他对你一见钟情，当场撕毁欠条，拉着你领了证。虽然开始得很荒唐，但他确实把你捧在手心里。".to_string(),
        chat_frequency: ChatFrequency::High,
        gender: Gender::Male,
        custom_chat_background: None,
        memory: vec!["【初始设定】性格：强势霸道；经历：撕毁欠条强娶。".to_string()],
    }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_apply_profile_keeps_identity_and_memory() {
        let mut original = Character::new("阿青");
        original.memory.push("【2024/01/01 10:00:00】 一起看了海".to_string());
        let id = original.id.clone();

        let mut edited = Character::new("阿青青").with_frequency(ChatFrequency::Low);
        edited.memory.push("should be ignored".to_string());
        original.apply_profile(edited);

        assert_eq!(original.id, id);
        assert_eq!(original.name, "阿青青");
        assert_eq!(original.chat_frequency, ChatFrequency::Low);
        assert_eq!(original.memory.len(), 1);
    }

    #[test]
    fn test_frequency_parses_lowercase() {
        assert_eq!(ChatFrequency::from_str("high").unwrap(), ChatFrequency::High);
        assert_eq!(ChatFrequency::High.to_string(), "high");
    }
}
