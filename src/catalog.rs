//! Built-in model catalogue.
//!
//! A convenience set of known models covering all four wire protocols. Hosts
//! are free to construct their own [`ModelDefinition`]s; nothing in the
//! engine requires a model to come from here.

use crate::types::{ModelCapabilities, ModelDefinition, WireProtocol};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";
pub const GOOGLE_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// All catalogue entries.
pub fn builtin_models() -> Vec<ModelDefinition> {
    vec![
        gpt_4o(),
        gpt_4o_mini(),
        gpt_5(),
        o3(),
        claude_sonnet_4(),
        claude_haiku_3_5(),
        gemini_2_5_pro(),
        gemini_2_5_flash(),
    ]
}

/// Look up a catalogue entry by model id.
pub fn find_model(id: &str) -> Option<ModelDefinition> {
    builtin_models().into_iter().find(|m| m.id == id)
}

pub fn gpt_4o() -> ModelDefinition {
    openai_completions("gpt-4o", "GPT-4o", 128_000, 16_384, 2.50, 10.00)
}

pub fn gpt_4o_mini() -> ModelDefinition {
    openai_completions("gpt-4o-mini", "GPT-4o mini", 128_000, 16_384, 0.15, 0.60)
}

pub fn gpt_5() -> ModelDefinition {
    let mut model = openai_responses("gpt-5", "GPT-5", 400_000, 128_000, 1.25, 10.00);
    model.capabilities.reasoning = true;
    model
}

pub fn o3() -> ModelDefinition {
    let mut model = openai_responses("o3", "o3", 200_000, 100_000, 2.00, 8.00);
    model.capabilities.reasoning = true;
    model
}

pub fn claude_sonnet_4() -> ModelDefinition {
    let mut model = anthropic(
        "claude-sonnet-4-20250514",
        "Claude Sonnet 4",
        200_000,
        64_000,
        3.00,
        15.00,
    );
    model.capabilities.reasoning = true;
    model
}

pub fn claude_haiku_3_5() -> ModelDefinition {
    anthropic(
        "claude-3-5-haiku-20241022",
        "Claude Haiku 3.5",
        200_000,
        8_192,
        0.80,
        4.00,
    )
}

pub fn gemini_2_5_pro() -> ModelDefinition {
    let mut model = google(
        "gemini-2.5-pro",
        "Gemini 2.5 Pro",
        1_048_576,
        65_536,
        1.25,
        10.00,
    );
    model.capabilities.reasoning = true;
    model
}

pub fn gemini_2_5_flash() -> ModelDefinition {
    google(
        "gemini-2.5-flash",
        "Gemini 2.5 Flash",
        1_048_576,
        65_536,
        0.30,
        2.50,
    )
}

fn openai_completions(
    id: &str,
    display_name: &str,
    context_window: u32,
    max_output_tokens: u32,
    input_cost: f64,
    output_cost: f64,
) -> ModelDefinition {
    entry(
        id,
        display_name,
        "openai",
        WireProtocol::OpenAiCompletions,
        OPENAI_BASE_URL,
        context_window,
        max_output_tokens,
        input_cost,
        output_cost,
    )
}

fn openai_responses(
    id: &str,
    display_name: &str,
    context_window: u32,
    max_output_tokens: u32,
    input_cost: f64,
    output_cost: f64,
) -> ModelDefinition {
    entry(
        id,
        display_name,
        "openai",
        WireProtocol::OpenAiResponses,
        OPENAI_BASE_URL,
        context_window,
        max_output_tokens,
        input_cost,
        output_cost,
    )
}

fn anthropic(
    id: &str,
    display_name: &str,
    context_window: u32,
    max_output_tokens: u32,
    input_cost: f64,
    output_cost: f64,
) -> ModelDefinition {
    entry(
        id,
        display_name,
        "anthropic",
        WireProtocol::AnthropicMessages,
        ANTHROPIC_BASE_URL,
        context_window,
        max_output_tokens,
        input_cost,
        output_cost,
    )
}

fn google(
    id: &str,
    display_name: &str,
    context_window: u32,
    max_output_tokens: u32,
    input_cost: f64,
    output_cost: f64,
) -> ModelDefinition {
    entry(
        id,
        display_name,
        "google",
        WireProtocol::GoogleGenerateContent,
        GOOGLE_BASE_URL,
        context_window,
        max_output_tokens,
        input_cost,
        output_cost,
    )
}

#[allow(clippy::too_many_arguments)]
fn entry(
    id: &str,
    display_name: &str,
    provider: &str,
    protocol: WireProtocol,
    base_url: &str,
    context_window: u32,
    max_output_tokens: u32,
    input_cost: f64,
    output_cost: f64,
) -> ModelDefinition {
    ModelDefinition {
        id: id.to_string(),
        display_name: display_name.to_string(),
        provider: provider.to_string(),
        protocol,
        base_url: base_url.to_string(),
        context_window,
        max_output_tokens,
        input_cost_per_million: input_cost,
        output_cost_per_million: output_cost,
        capabilities: ModelCapabilities {
            vision: true,
            ..ModelCapabilities::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_id() {
        let model = find_model("gpt-4o").unwrap();
        assert_eq!(model.protocol, WireProtocol::OpenAiCompletions);
        assert!(find_model("not-a-model").is_none());
    }

    #[test]
    fn catalogue_covers_every_protocol() {
        let models = builtin_models();
        for protocol in [
            WireProtocol::OpenAiCompletions,
            WireProtocol::OpenAiResponses,
            WireProtocol::AnthropicMessages,
            WireProtocol::GoogleGenerateContent,
        ] {
            assert!(models.iter().any(|m| m.protocol == protocol));
        }
    }

    #[test]
    fn cost_uses_model_rates() {
        let model = claude_sonnet_4();
        let usage = crate::types::Usage::new(1_000_000, 2_000_000);
        let cost = model.cost_for(&usage);
        assert!((cost.input_cost - 3.00).abs() < 1e-9);
        assert!((cost.output_cost - 30.00).abs() < 1e-9);
    }
}
