//! Prompt templates and response schemas for the generative backend.
//!
//! Provider-agnostic: rendering produces plain messages, schemas are plain
//! JSON Schema values.

use serde_json::{json, Value};

use crate::distribution::AXIS_SLOTS;
use crate::gateway::Message;
use crate::taxonomy::JourneyStage;

/// Problem clusters requested from the taxonomy provider.
pub const REQUESTED_CLUSTERS: usize = 45;

// =============================================================================
// Rendered prompts
// =============================================================================

/// Rendered prompt ready for the model.
#[derive(Debug, Clone)]
pub struct PromptInstance {
    pub template_slug: &'static str,
    pub system: String,
    pub user: String,
}

impl PromptInstance {
    pub fn to_messages(&self) -> Vec<Message> {
        vec![Message::system(&self.system), Message::user(&self.user)]
    }
}

/// Escape XML special characters so user text cannot break out of its tag.
fn escape_xml_chars(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

// =============================================================================
// Taxonomy
// =============================================================================

const TAXONOMY_SYSTEM: &str = "\
You are a Chief Product Officer and a Jobs-to-be-Done expert. Build a realistic \
customer value space for the product the user describes.

Customer jobs (axis X):
- Exactly {axis_slots} jobs.
- Each job is a stable, end goal in the customer's life or business, phrased as \
verb + object (+ optional context), e.g. \"Look confident at an important meeting\".
- Never instrumental steps such as \"Track my order\" or \"Find the filter button\".
- Order by how common the job is, most common first.

Segments (axis Z): exactly {axis_slots}, ordered from active/young/new to \
passive/older/loyal.

Contexts (axis Y): exactly {axis_slots}, ordered from low intensity/private to \
high intensity/public.

Problem clusters: exactly {clusters}. For each cluster give
- name: a short problem name
- journeyStage: one of {stages}
- impactWeight: a number 1-10 (10 = critical for the business)
- templates: 8-12 realistic signal texts (search queries, support tickets, \
reviews, chat lines, interview quotes)

Output strictly valid JSON.";

/// Prompt asking for a full product config.
pub fn taxonomy_prompt(description: &str) -> PromptInstance {
    let stages = JourneyStage::ALL
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    PromptInstance {
        template_slug: "taxonomy_v1",
        system: TAXONOMY_SYSTEM
            .replace("{axis_slots}", &AXIS_SLOTS.to_string())
            .replace("{clusters}", &REQUESTED_CLUSTERS.to_string())
            .replace("{stages}", &stages),
        user: format!(
            "Generate a product value space configuration for this product:\n\
             <product>{}</product>",
            escape_xml_chars(description.trim())
        ),
    }
}

/// JSON schema of the product config reply.
pub fn product_config_schema() -> Value {
    let stages: Vec<&str> = JourneyStage::ALL.iter().map(|s| s.as_str()).collect();
    let labels = json!({ "type": "array", "items": { "type": "string" } });
    json!({
        "type": "object",
        "properties": {
            "productName": { "type": "string" },
            "jobs": labels,
            "segments": labels,
            "contexts": labels,
            "clusters": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": { "type": "string" },
                        "journeyStage": { "type": "string", "enum": stages },
                        "impactWeight": { "type": "number" },
                        "templates": labels
                    },
                    "required": ["name", "journeyStage", "impactWeight", "templates"],
                    "additionalProperties": false
                }
            }
        },
        "required": ["productName", "jobs", "segments", "contexts", "clusters"],
        "additionalProperties": false
    })
}

// =============================================================================
// Hypotheses
// =============================================================================

const HYPOTHESIS_SYSTEM: &str = "\
You are a senior CPO: confident, analytical, concise. You write testable \
product hypotheses.";

const HYPOTHESIS_USER: &str = "\
<product>{product}</product>
<problem_cluster>{cluster}</problem_cluster>

Generate 9 strategic hypotheses that address this problem cluster, 3 per category:
1. quickWins: 1-2 weeks of development
2. balanced: 1-3 months
3. revolutionary: an innovative bet aimed at multiplied growth

Every hypothesis starts with \"We believe that\" and follows the shape: \
\"We believe that [specific change] will lead to [measurable outcome], because \
[insight]\".

Respond with JSON only.";

pub fn hypothesis_prompt(cluster_name: &str, product_name: &str) -> PromptInstance {
    PromptInstance {
        template_slug: "hypotheses_v1",
        system: HYPOTHESIS_SYSTEM.to_string(),
        user: HYPOTHESIS_USER
            .replace("{product}", &escape_xml_chars(product_name))
            .replace("{cluster}", &escape_xml_chars(cluster_name)),
    }
}

/// JSON schema of the hypothesis reply.
pub fn hypothesis_schema() -> Value {
    let list = json!({
        "type": "array",
        "items": {
            "type": "object",
            "properties": { "text": { "type": "string" } },
            "required": ["text"],
            "additionalProperties": false
        }
    });
    json!({
        "type": "object",
        "properties": {
            "quickWins": list,
            "balanced": list,
            "revolutionary": list
        },
        "required": ["quickWins", "balanced", "revolutionary"],
        "additionalProperties": false
    })
}

// =============================================================================
// Co-pilot chat
// =============================================================================

const COPILOT_SYSTEM: &str = "\
You are a product co-pilot working with a senior product manager in a war room.
You see the full product value space model and are analyzing one problem cluster.

Style:
- Act like a senior CPO or data scientist: concise, sharp, data-driven.
- No filler and no \"as an AI\" phrasing. Just answer.
- User stories follow the strict \"As a / I want / so that\" format.
- Metrics are defined precisely.

Goal: help the user decide, produce concrete tasks or estimate potential impact.";

pub fn copilot_prompt(message: &str, context: &str) -> PromptInstance {
    PromptInstance {
        template_slug: "copilot_v1",
        system: COPILOT_SYSTEM.to_string(),
        user: format!(
            "<context>\n{}\n</context>\n<message>{}</message>",
            escape_xml_chars(context.trim()),
            escape_xml_chars(message.trim())
        ),
    }
}
