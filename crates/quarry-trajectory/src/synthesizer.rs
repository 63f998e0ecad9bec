use tracing::info;

use quarry_core::{QuarryError, ScoredResult, Trajectory};
use quarry_index::FunctionIndex;
use quarry_search::llm::{ChatMessage, CompletionOptions, LlmClient};

use crate::prompt::{self, ComponentDetail, ComponentSummary};

/// How many ranked results to ground the trajectories in.
const COMPONENT_LIMIT: usize = 20;

/// Sampling temperature for synthesis: higher, for more creative directions.
const SYNTHESIS_TEMPERATURE: f32 = 0.7;

/// Sampling temperature for code generation: low, for focused output.
const PROTOTYPE_TEMPERATURE: f32 = 0.2;

/// Synthesize research trajectories from an already-ranked result set.
///
/// The top ranked results (at most 20) become the component context for the
/// prompt. This path fails open: with no provider client configured it
/// returns an empty list rather than an error, unlike the search
/// orchestrator's fail-closed keyword fallback. An empty ranked set also
/// yields an empty list without a provider call.
///
/// # Errors
///
/// Returns [`QuarryError::Provider`] or [`QuarryError::ResponseParse`] when
/// a configured provider call fails.
pub async fn synthesize(
    client: Option<&LlmClient>,
    query: &str,
    ranked: &[ScoredResult],
    count: usize,
) -> Result<Vec<Trajectory>, QuarryError> {
    let Some(client) = client else {
        info!("no provider credential configured, returning no trajectories");
        return Ok(Vec::new());
    };
    if ranked.is_empty() {
        return Ok(Vec::new());
    }

    let components: Vec<ComponentSummary> = ranked
        .iter()
        .take(COMPONENT_LIMIT)
        .map(ComponentSummary::from_result)
        .collect();

    let messages = [
        ChatMessage::system(prompt::build_trajectory_system_prompt()),
        ChatMessage::user(prompt::build_trajectory_prompt(query, &components, count)),
    ];

    let content = client
        .complete(
            &messages,
            CompletionOptions {
                temperature: SYNTHESIS_TEMPERATURE,
                json_response: true,
            },
        )
        .await?;

    prompt::parse_trajectory_response(&content)
}

/// Generate prototype source code for one trajectory.
///
/// The trajectory's `existing_components` are resolved against the index by
/// function name (any repository) so the model sees their actual code;
/// unresolvable names are simply omitted from the context.
///
/// # Errors
///
/// Returns [`QuarryError::Provider`] or [`QuarryError::ResponseParse`] when
/// the provider call fails.
pub async fn generate_prototype(
    client: &LlmClient,
    trajectory: &Trajectory,
    index: &FunctionIndex,
) -> Result<String, QuarryError> {
    let components: Vec<ComponentDetail> = trajectory
        .existing_components
        .iter()
        .filter_map(|name| {
            index
                .records()
                .iter()
                .find(|r| &r.function_name == name)
                .map(|record| ComponentDetail {
                    name: record.function_name.clone(),
                    signature: record.signature.clone(),
                    code: record.code.clone(),
                    docstring: record.docstring.clone(),
                })
        })
        .collect();

    let messages = [
        ChatMessage::system(prompt::build_prototype_system_prompt()),
        ChatMessage::user(prompt::build_prototype_prompt(trajectory, &components)),
    ];

    client
        .complete(
            &messages,
            CompletionOptions {
                temperature: PROTOTYPE_TEMPERATURE,
                json_response: false,
            },
        )
        .await
}
