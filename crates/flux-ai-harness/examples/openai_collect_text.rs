use std::sync::Arc;

use flux_ai_harness::prelude::*;
use flux_ai_harness::vendors::openai::{
    OpenAiProvider, OpenAiRequestOptions, OpenAiRunBuilderExt,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), HarnessError> {
    let harness = Harness::builder()
        .register_provider(Arc::new(OpenAiProvider::from_env()?))
        .build()?;

    let output = harness
        .session(SessionConfig::named("collect"))
        .run(ModelRef::new("openai", "gpt-4o-mini"))
        .system_prompt("You are a concise assistant. Reply with a short sentence.")
        .user_text("Say hello to the hero collectors.")
        .openai_options(OpenAiRequestOptions::default().store(false))
        .collect_output()
        .await?;

    println!("{}", output.text());
    println!(
        "fragments={} finish_reason={}",
        output.fragments.len(),
        output.finish_reason.as_deref().unwrap_or("unknown")
    );
    Ok(())
}
