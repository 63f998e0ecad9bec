use serde::Serialize;

use quarry_core::{QuarryError, ScoredResult, Trajectory};
use quarry_search::prompt::strip_code_fences;

const TRAJECTORY_SYSTEM_PROMPT: &str = "\
You are a research assistant that helps identify promising and creative \
research directions. You MUST return valid JSON.";

const PROTOTYPE_SYSTEM_PROMPT: &str = "\
You are a research code generator that creates prototype implementations. \
You excel at writing clean, efficient code. Respond with ONLY valid source \
code, without any additional explanation or markdown.";

/// Maximum docstring length included per component summary.
const DOCSTRING_PREVIEW: usize = 200;

/// A ranked function condensed for the trajectory prompt.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentSummary {
    /// Function name.
    pub name: String,
    /// Owning repository.
    pub repo: String,
    /// Signature, when available.
    pub signature: String,
    /// Docstring preview.
    pub docstring: String,
}

impl ComponentSummary {
    /// Condense a scored search result into a prompt component.
    pub fn from_result(result: &ScoredResult) -> Self {
        let docstring = &result.record.docstring;
        let docstring = if docstring.len() > DOCSTRING_PREVIEW {
            let cut = docstring
                .char_indices()
                .take_while(|(i, _)| *i <= DOCSTRING_PREVIEW)
                .last()
                .map_or(0, |(i, _)| i);
            format!("{}...", &docstring[..cut])
        } else {
            docstring.clone()
        };
        Self {
            name: result.record.function_name.clone(),
            repo: result.record.repo_name.clone(),
            signature: result.record.signature.clone(),
            docstring,
        }
    }
}

/// A component with its full source, for prototype generation.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentDetail {
    /// Function name.
    pub name: String,
    /// Signature, when available.
    pub signature: String,
    /// Full source text.
    pub code: String,
    /// Docstring, when available.
    pub docstring: String,
}

/// System prompt for trajectory synthesis.
pub fn build_trajectory_system_prompt() -> String {
    TRAJECTORY_SYSTEM_PROMPT.to_string()
}

/// System prompt for prototype generation.
pub fn build_prototype_system_prompt() -> String {
    PROTOTYPE_SYSTEM_PROMPT.to_string()
}

/// Build the user prompt asking for `count` research trajectories grounded
/// in the available components.
///
/// # Examples
///
/// ```
/// use quarry_trajectory::prompt::{build_trajectory_prompt, ComponentSummary};
///
/// let components = vec![ComponentSummary {
///     name: "diameter".into(),
///     repo: "networkx".into(),
///     signature: "def diameter(G)".into(),
///     docstring: String::new(),
/// }];
/// let prompt = build_trajectory_prompt("graph analysis at scale", &components, 3);
/// assert!(prompt.contains("RESEARCH QUESTION: graph analysis at scale"));
/// assert!(prompt.contains("\"trajectories\""));
/// ```
pub fn build_trajectory_prompt(query: &str, components: &[ComponentSummary], count: usize) -> String {
    let components_json =
        serde_json::to_string_pretty(components).unwrap_or_else(|_| "[]".to_string());

    format!(
        "Given a research question and a set of functions extracted from \
         various repositories, suggest {count} potential research trajectories.\n\n\
         RESEARCH QUESTION: {query}\n\n\
         AVAILABLE CODE COMPONENTS:\n{components_json}\n\n\
         For each research trajectory, provide a title, the core research \
         question, why it is interesting and potentially impactful, the key \
         existing components it would use, what new components would need to \
         be developed, potential challenges, and how success would be \
         evaluated. The trajectories should be novel, feasible given the \
         available components, and distinct from each other.\n\n\
         CRITICAL: You MUST respond with valid JSON only. Your response must \
         be a JSON object with a 'trajectories' array containing objects with \
         the fields: title, core_question, rationale, existing_components, \
         new_components, challenges, and evaluation.\n\n\
         Example response format:\n\
         {{\n  \"trajectories\": [\n    {{\n      \"title\": \"Research Trajectory Title\",\n      \
         \"core_question\": \"Specific research question to investigate\",\n      \
         \"rationale\": \"Why this direction is interesting and impactful\",\n      \
         \"existing_components\": [\"component1\", \"component2\"],\n      \
         \"new_components\": [\"new_component1\"],\n      \
         \"challenges\": [\"challenge1\"],\n      \
         \"evaluation\": \"How to evaluate success\"\n    }}\n  ]\n}}\n"
    )
}

/// Build the user prompt asking for a runnable prototype of one trajectory.
pub fn build_prototype_prompt(trajectory: &Trajectory, components: &[ComponentDetail]) -> String {
    let trajectory_json =
        serde_json::to_string_pretty(trajectory).unwrap_or_else(|_| "{}".to_string());
    let components_json =
        serde_json::to_string_pretty(components).unwrap_or_else(|_| "[]".to_string());

    format!(
        "You are tasked with creating a prototype implementation for a \
         research project.\n\n\
         RESEARCH TRAJECTORY:\n{trajectory_json}\n\n\
         EXISTING COMPONENTS TO USE:\n{components_json}\n\n\
         Your task is to generate a prototype that implements the core \
         functionality needed for this research direction, leverages the \
         existing components appropriately, adds the new components the \
         trajectory specifies, and includes clear comments. The prototype \
         should be a complete module with all necessary imports and a main \
         function demonstrating the functionality.\n\n\
         IMPORTANT: Respond with ONLY valid source code, without any \
         additional explanation or markdown.\n"
    )
}

#[derive(serde::Deserialize)]
struct TrajectoryResponse {
    #[serde(default)]
    trajectories: Vec<Trajectory>,
}

/// Parse the synthesis response content into trajectories.
///
/// An empty `trajectories` array parses to an empty list. Unlike the
/// search tier, synthesis fails open and an empty list is a valid outcome.
///
/// # Errors
///
/// Returns [`QuarryError::ResponseParse`] on malformed JSON.
///
/// # Examples
///
/// ```
/// use quarry_trajectory::prompt::parse_trajectory_response;
///
/// let parsed = parse_trajectory_response(r#"{"trajectories":[]}"#).unwrap();
/// assert!(parsed.is_empty());
/// ```
pub fn parse_trajectory_response(content: &str) -> Result<Vec<Trajectory>, QuarryError> {
    let cleaned = strip_code_fences(content);
    let parsed: TrajectoryResponse = serde_json::from_str(cleaned)
        .map_err(|e| QuarryError::ResponseParse(format!("invalid trajectories payload: {e}")))?;
    Ok(parsed.trajectories)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::FunctionRecord;

    fn scored(name: &str, docstring: &str) -> ScoredResult {
        ScoredResult {
            record: FunctionRecord {
                function_name: name.into(),
                repo_name: "repo".into(),
                file_path: "mod.py".into(),
                signature: format!("def {name}()"),
                docstring: docstring.into(),
                code: "pass".into(),
                source: String::new(),
            },
            relevance_score: 9.0,
            explanation: None,
            experiment: "exp".into(),
        }
    }

    #[test]
    fn component_summary_truncates_docstring() {
        let long = "d".repeat(400);
        let summary = ComponentSummary::from_result(&scored("f", &long));
        assert!(summary.docstring.len() < 400);
        assert!(summary.docstring.ends_with("..."));
    }

    #[test]
    fn trajectory_prompt_embeds_components_as_json() {
        let components = vec![ComponentSummary::from_result(&scored("diameter", "doc"))];
        let prompt = build_trajectory_prompt("q", &components, 3);
        assert!(prompt.contains("\"name\": \"diameter\""));
        assert!(prompt.contains("suggest 3 potential research trajectories"));
    }

    #[test]
    fn parse_valid_trajectories() {
        let json = r#"{"trajectories":[{
            "title": "T",
            "core_question": "Q",
            "rationale": "R",
            "existing_components": ["a"],
            "new_components": ["b"],
            "challenges": ["c"],
            "evaluation": "E"
        }]}"#;
        let parsed = parse_trajectory_response(json).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].title, "T");
        assert_eq!(parsed[0].existing_components, vec!["a"]);
    }

    #[test]
    fn parse_with_code_fences() {
        let fenced = "```json\n{\"trajectories\":[]}\n```";
        assert!(parse_trajectory_response(fenced).unwrap().is_empty());
    }

    #[test]
    fn parse_missing_field_is_empty_not_error() {
        let parsed = parse_trajectory_response("{}").unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn parse_malformed_is_error() {
        assert!(parse_trajectory_response("no json here").is_err());
    }

    #[test]
    fn prototype_prompt_includes_trajectory_and_code() {
        let trajectory = Trajectory {
            title: "Streaming diameter".into(),
            core_question: "Q".into(),
            rationale: "R".into(),
            existing_components: vec!["diameter".into()],
            new_components: vec![],
            challenges: vec![],
            evaluation: String::new(),
        };
        let components = vec![ComponentDetail {
            name: "diameter".into(),
            signature: "def diameter(G)".into(),
            code: "def diameter(G): ...".into(),
            docstring: String::new(),
        }];
        let prompt = build_prototype_prompt(&trajectory, &components);
        assert!(prompt.contains("Streaming diameter"));
        assert!(prompt.contains("def diameter(G): ..."));
    }
}
