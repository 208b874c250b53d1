use terminal_size::{terminal_size, Width};

pub struct BannerInfo {
    pub version: String,
    pub provider: Option<String>,
    pub model: String,
    pub character: Option<String>,
    pub scene: String,
    pub memory_enabled: bool,
    pub memory_count: usize,
}

pub fn print_startup_banner(info: &BannerInfo) {
    let term_width = terminal_size()
        .map(|(Width(w), _)| w as usize)
        .unwrap_or(80);

    let heart = [
        r"  .-.  .-.   ",
        r" |   \/   |  ",
        r"  \      /   ",
        r"   `\  /`    ",
        r"     \/      ",
        r"             ",
        r"             ",
    ];

    let title = format!("\x1b[1;35mSoulMate\x1b[0m v{}", info.version);

    let provider_line = match &info.provider {
        Some(p) => format!("\x1b[90mProvider:\x1b[0m  \x1b[32m{p}\x1b[0m"),
        None => "\x1b[90mProvider:\x1b[0m  \x1b[31mnone configured\x1b[0m".to_string(),
    };

    let model_line = format!("\x1b[90mModel:\x1b[0m     \x1b[36m{}\x1b[0m", info.model);

    let character = info.character.as_deref().unwrap_or("-");
    let character_line = truncate(
        &format!("\x1b[90mWith:\x1b[0m      \x1b[33m{character}\x1b[0m"),
        term_width.saturating_sub(16),
    );

    let scene_line = format!("\x1b[90mScene:\x1b[0m     {}", info.scene);

    let memory_line = if info.memory_enabled {
        format!(
            "\x1b[90mMemory:\x1b[0m    \x1b[32menabled\x1b[0m ({} entries)",
            info.memory_count
        )
    } else {
        "\x1b[90mMemory:\x1b[0m    \x1b[90mdisabled\x1b[0m".to_string()
    };

    let info_lines: [&str; 7] = [
        &title,
        "",
        &provider_line,
        &model_line,
        &character_line,
        &scene_line,
        &memory_line,
    ];

    println!();
    for (i, art_line) in heart.iter().enumerate() {
        let info_line = info_lines.get(i).copied().unwrap_or("");
        println!("\x1b[31m{art_line}\x1b[0m    {info_line}");
    }
    println!();

    println!(
        "  \x1b[90m/help\x1b[0m commands  \x1b[90m/meet\x1b[0m face-to-face  \x1b[90m/quit\x1b[0m exit"
    );
    println!();
}

fn truncate(line: &str, max_chars: usize) -> String {
    if line.chars().count() <= max_chars {
        line.to_string()
    } else {
        let kept: String = line.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{kept}...\x1b[0m")
    }
}
