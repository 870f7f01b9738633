//! `docforge parse`: run the section parser over a model response on stdin.

use docforge_config::AppConfig;
use docforge_engine::{SectionParser, variants};
use tokio::io::AsyncReadExt;

pub async fn run(bot: Option<String>, query: bool) -> Result<(), Box<dyn std::error::Error>> {
    let bot = match bot {
        Some(bot) => bot,
        None => AppConfig::load().map(|c| c.bot).unwrap_or_else(|_| "kql_expert".into()),
    };

    let mut input = String::new();
    tokio::io::stdin().read_to_string(&mut input).await?;

    println!("{}", render(&bot, &input, query)?);
    Ok(())
}

/// Parse `input` with the schema of variant `bot` and render the result as
/// pretty JSON.
fn render(bot: &str, input: &str, query: bool) -> Result<String, Box<dyn std::error::Error>> {
    let variant = variants::by_name(bot).ok_or_else(|| format!("Unknown bot '{bot}'"))?;

    let json = if query {
        let parsed = SectionParser::for_query(variant.ephemeral_label.as_deref()).parse_query(input);
        serde_json::to_string_pretty(&parsed)?
    } else {
        let parsed = SectionParser::for_schema(&variant.schema).parse(input)?;
        serde_json::to_string_pretty(&parsed)?
    };
    Ok(json)
}
