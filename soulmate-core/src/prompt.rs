//! Instruction and transcript builders for every generation call.
//!
//! All prompts are in Simplified Chinese: characters are asked to reply in
//! Chinese and the transcript labels must match the language of the reply.

use crate::character::{ChatFrequency, Character, UserProfile};
use crate::store::{Message, Scene, Sender};

/// Separator a phone reply uses between consecutive chat bubbles.
pub const MESSAGE_DELIMITER: &str = "|||";

/// Label for the user's lines in a chat transcript.
pub const USER_LABEL: &str = "用户";

pub fn chat_system_prompt(
    character: &Character,
    user: &UserProfile,
    scene: Scene,
    location: Option<&str>,
) -> String {
    let mut prompt = format!(
        "你正在扮演 {name}。\n\
         语言要求：必须完全使用中文（简体）。\n\n\
         你的性格：{personality}\n\
         你的外貌：{appearance}\n\
         你的说话风格：{speaking_style}\n\
         你与用户的关系：{relationship}\n\
         你的背景故事：{background_story}\n",
        name = character.name,
        personality = character.personality,
        appearance = character.appearance,
        speaking_style = character.speaking_style,
        relationship = character.relationship,
        background_story = character.background_story,
    );

    if !character.memory.is_empty() {
        prompt.push_str("\n你记得和用户之间发生过的事：\n");
        for entry in &character.memory {
            prompt.push_str("- ");
            prompt.push_str(entry);
            prompt.push('\n');
        }
    }

    prompt.push_str(&format!(
        "\n用户资料：\n名字：{}\n性格：{}\n外貌：{}\n背景：{}\n",
        user.name, user.personality, user.appearance, user.background_story
    ));

    match scene {
        Scene::Phone => {
            prompt.push_str("\n当前场景：我们在手机聊天软件（微信）上聊天。\n");
            prompt.push_str(
                "\n手机模式严格规则：\n\
                 1. 禁止使用括号 () 或星号 * 来描述动作或心理活动。\n\
                 2. 只发送你在短信中会打出来的文字。\n\
                 3. 可以适当使用 Emoji 表情。\n\
                 4. 保持回复相对简短、日常。\n\
                 5. 把用户当作亲密的人。\n",
            );
            prompt.push_str(&frequency_policy(character.chat_frequency));
        }
        Scene::Activity => {
            let location = location.unwrap_or("某个地方");
            prompt.push_str(&format!(
                "\n当前场景：我们在现实生活中的地点：{location}。\n\
                 \n活动模式严格规则：\n\
                 1. 你必须使用括号 () 来详细描述你的肢体动作、面部表情和心理活动。\n\
                 2. 例如：(害羞地移开视线) 我觉得那样也行...\n\
                 3. 结合环境描写。\n\
                 4. 与环境 \"{location}\" 互动。\n\
                 5. 只输出一段完整的回复。\n"
            ));
        }
    }

    prompt
}

/// How many bubbles a phone reply should be split into.
pub fn frequency_policy(frequency: ChatFrequency) -> String {
    let count = match frequency {
        ChatFrequency::High => "3到5条",
        ChatFrequency::Medium => "1到3条",
        ChatFrequency::Low => "1条",
    };
    format!(
        "\n回复节奏：你是一个{style}的人，这次回复请发送{count}消息。\n\
         多条消息之间用 \"{MESSAGE_DELIMITER}\" 分隔，例如：在{MESSAGE_DELIMITER}怎么啦\n",
        style = match frequency {
            ChatFrequency::High => "很爱发消息、话很多",
            ChatFrequency::Medium => "正常聊天节奏",
            ChatFrequency::Low => "话很少、惜字如金",
        },
    )
}

/// Render a history as `label: text` lines.
pub fn render_transcript(user_label: &str, character_name: &str, history: &[Message]) -> String {
    history
        .iter()
        .map(|message| {
            let speaker = match message.sender {
                Sender::User => user_label,
                Sender::Ai => character_name,
            };
            format!("{speaker}: {}", message.text)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// The single user turn sent for a chat generation. If `history` does not end
/// with a user line, `prompt` is added as one so the model always answers
/// the user.
pub fn chat_turn(character_name: &str, history: &[Message], prompt: &str) -> String {
    let mut transcript = render_transcript(USER_LABEL, character_name, history);
    let ends_with_user = history.last().is_some_and(Message::is_user);
    if !ends_with_user {
        if !transcript.is_empty() {
            transcript.push('\n');
        }
        transcript.push_str(&format!("{USER_LABEL}: {prompt}"));
    }
    format!("{transcript}\n{character_name}:")
}

pub fn summary_system_prompt() -> String {
    "你是一个记忆整理助手。请用50到100个字，以第三人称概括下面这段对话中发生的关键事件和情感变化。\
     只输出概括本身，不要添加标题、引号或解释。"
        .to_string()
}

pub fn summary_turn(character_name: &str, user_name: &str, messages: &[Message]) -> String {
    format!(
        "对话双方：{user_name} 和 {character_name}。\n\n{}",
        render_transcript(user_name, character_name, messages)
    )
}

pub fn scene_system_prompt(names: &[String], fallback: &str) -> String {
    format!(
        "你是一个场景判断助手。根据对话内容判断两人当前所在的地点，\
         只能从以下列表中选择一个：{}。\n\
         如果没有合适的地点，选择 \"{fallback}\"。\n\
         以 JSON 格式输出：{{\"scene\": \"地点名称\"}}",
        names.join("、")
    )
}

pub fn scene_turn(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| m.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn moment_system_prompt(character: &Character) -> String {
    format!(
        "你正在扮演 {name}。性格：{personality}\n\
         以第一人称写一条你自己的朋友圈，内容是日常生活，简短自然，可以带 Emoji。\n\
         格式：JSON 对象，包含 \"content\" 字段（朋友圈文案，中文）。",
        name = character.name,
        personality = character.personality,
    )
}

pub fn moment_turn(character: &Character) -> String {
    format!("生成一条 {} 的朋友圈内容。", character.name)
}

pub fn comment_reply_system_prompt(character: &Character) -> String {
    format!(
        "你正在扮演 {name}。性格：{personality}\n说话风格：{speaking_style}\n\
         你在朋友圈下回复别人的评论。回复要简短（一句话），符合你的性格，只输出回复内容。",
        name = character.name,
        personality = character.personality,
        speaking_style = character.speaking_style,
    )
}

pub fn comment_reply_turn(post_author: &str, post: &str, comment_author: &str, comment: &str) -> String {
    format!("朋友圈（{post_author}）：{post}\n{comment_author} 评论：{comment}\n你的回复：")
}
