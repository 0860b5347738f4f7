use std::collections::HashMap;
use std::sync::Arc;

use flux_ai_harness::prelude::*;
use flux_core::Role;
use flux_ai_harness::vendors::openai::{
    OpenAiProvider, OpenAiRequestOptions, OpenAiRunBuilderExt,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), HarnessError> {
    let harness = Harness::builder()
        .register_provider(Arc::new(OpenAiProvider::from_env()?))
        .build()?;

    let mut run = harness
        .session(SessionConfig::named("stream"))
        .run(ModelRef::new("openai", "gpt-4o-mini"))
        .system_prompt("Reply to test fragment streaming.")
        .user_text("Stream a greeting.")
        .openai_options(OpenAiRequestOptions::default().store(false))
        .start_stream()
        .await?;

    // Snapshots repeat the whole message; print only the new suffix.
    let mut printed: HashMap<String, usize> = HashMap::new();
    while let Some(event) = run.next_event().await {
        match event {
            StreamEvent::Fragment { fragment, .. } if fragment.role == Role::Assistant => {
                let seen = printed.entry(fragment.id.clone()).or_default();
                if let Some(tail) = fragment.content.get(*seen..) {
                    print!("{tail}");
                }
                *seen = fragment.content.len();
            }
            StreamEvent::Fragment { .. } => {}
            StreamEvent::Finished { .. } => println!(),
            StreamEvent::Error { error, .. } => eprintln!("run error: {error}"),
            StreamEvent::RunStarted { .. } => {}
        }
    }

    let _ = run.finish().await?;
    Ok(())
}
