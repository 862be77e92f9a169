//! Chain-of-thought prompts and response parsing.
//!
//! Every provider gets the same system prompt asking for a single JSON object
//! with numbered reasoning steps, insights, a summary and a self-reported
//! confidence. The parsed steps become the report's `chain_of_thought`.

use ai_client::{extract_json_object, output_schema, strip_code_blocks, CompletionRequest};
use onside_common::ReportType;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Cap on the serialized context handed to the model.
const MAX_CONTEXT_CHARS: usize = 24_000;

#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub kind: ReportType,
    /// Company or competitor the analysis is about.
    pub subject: String,
    /// Gathered source data.
    pub context: serde_json::Value,
    /// Extra instructions appended to the prompt.
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReasoningStep {
    pub step: u32,
    pub thought: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisOutput {
    pub reasoning: Vec<ReasoningStep>,
    pub insights: Vec<String>,
    pub summary: String,
    /// Self-reported confidence in [0, 1].
    pub confidence: f64,
}

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("no JSON object in response")]
    NoJson,
    #[error("malformed analysis JSON: {0}")]
    Malformed(String),
    #[error("confidence {0} outside [0, 1]")]
    ConfidenceOutOfRange(f64),
    #[error("empty summary")]
    EmptySummary,
    #[error("no reasoning steps")]
    EmptyReasoning,
}

fn focus(kind: ReportType) -> &'static str {
    match kind {
        ReportType::Competitor => {
            "Assess this competitor's positioning, product and pricing moves, \
             online presence and momentum relative to the market."
        }
        ReportType::Market => {
            "Assess the market: demand signals, notable players, emerging trends \
             and risks visible in the news and search data."
        }
        ReportType::Audience => {
            "Assess the target audience: who engages, what they care about, \
             and where the company can reach them."
        }
    }
}

pub fn system_prompt(kind: ReportType) -> String {
    format!(
        "You are a competitive-intelligence analyst. {focus}\n\n\
         Think step by step. Respond with ONE JSON object and nothing else:\n\
         {{\n  \"reasoning\": [{{\"step\": 1, \"thought\": \"...\"}}, ...],\n  \
         \"insights\": [\"...\"],\n  \"summary\": \"...\",\n  \"confidence\": 0.0\n}}\n\n\
         Rules:\n\
         - `reasoning` lists each step of your analysis in order, starting at 1.\n\
         - `insights` are concrete, actionable findings grounded in the data.\n\
         - `confidence` is a number between 0 and 1 reflecting how well the data supports your conclusions.\n\
         - If the data is thin, say so and lower your confidence; do not invent facts.",
        focus = focus(kind)
    )
}

pub fn user_prompt(request: &AnalysisRequest) -> String {
    let context = serde_json::to_string_pretty(&request.context).unwrap_or_default();
    let context = ai_client::truncate_to_char_boundary(&context, MAX_CONTEXT_CHARS);

    let mut prompt = format!(
        "Subject: {}\nReport type: {}\n\nCollected data:\n{}\n",
        request.subject, request.kind, context
    );
    if let Some(extra) = request.instructions.as_deref().filter(|s| !s.trim().is_empty()) {
        prompt.push_str("\nAdditional instructions:\n");
        prompt.push_str(extra);
        prompt.push('\n');
    }
    prompt
}

/// Build the provider-agnostic completion request for an analysis.
pub fn build_completion(request: &AnalysisRequest, temperature: f32) -> CompletionRequest {
    CompletionRequest::new(system_prompt(request.kind), user_prompt(request))
        .temperature(temperature)
        .response_schema(output_schema::<AnalysisOutput>())
}

/// Parse and validate a model response.
pub fn parse_analysis(text: &str) -> Result<AnalysisOutput, ParseError> {
    let stripped = strip_code_blocks(text);
    let json = extract_json_object(stripped).ok_or(ParseError::NoJson)?;
    let output: AnalysisOutput =
        serde_json::from_str(json).map_err(|e| ParseError::Malformed(e.to_string()))?;

    if !(0.0..=1.0).contains(&output.confidence) {
        return Err(ParseError::ConfidenceOutOfRange(output.confidence));
    }
    if output.summary.trim().is_empty() {
        return Err(ParseError::EmptySummary);
    }
    if output.reasoning.is_empty() {
        return Err(ParseError::EmptyReasoning);
    }
    Ok(output)
}
