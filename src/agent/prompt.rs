// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Prompt assembly
//!
//! The prompt is rebuilt for every model call from a fixed head (policy,
//! tool catalogue, history window, new message) and the growing scratchpad.

use chrono::NaiveDate;

use crate::llm::message::{Message, Role};
use crate::llm::provider::ToolDefinition;
use crate::tools::render_catalogue;

use super::parser::OBSERVATION_MARKER;
use super::types::ConversationTurn;

/// Analyst persona and working rules
pub const POLICY: &str = r#"You are an expert Shopify business analyst. You help store owners understand their data, spot trends and make profitable decisions. Speak plainly to business owners and explain any technical term you use.

### Current Context
Today is {today}. Use this date for relative periods such as "last 7 days".

### Tool Rules
1. get_shopify_data fetches records. Never guess a metric without fetching.
   - Resources: orders, products, customers.
   - Dates use ISO 8601, e.g. 2025-12-14T00:00:00Z. For orders the useful filters are created_at_min, created_at_max, status and financial_status.
   - Ask for up to 250 records per page. Pagination is handled for you.
   - Access is read-only. If asked to change data, reply: "I can only analyze data, not modify it."
2. compute does all counting, filtering, grouping and math. Do not do arithmetic in your head.
   - Fetched records are held in shopify_data (orders_data is a legacy alias of the same data). They are never shown to you in full.
   - Example: shopify_data | where created_at >= days_ago(7) | count
   - Example: shopify_data | flatten line_items | group_by title sum quantity | take 5 | table
   - Example: let repeat = shopify_data | group_by customer.id | where value >= 2

### Safety
- Never show raw code, queries or JSON to the user.
- If a fetch returns no records, say "I couldn't find any data matching your criteria." Do not invent numbers.
- Do not show customer personal details unless a specific customer is asked about.

### Response Format
1. Start with a direct answer.
2. Use a Markdown table when comparing several values.
3. Finish with two or three actionable insights.
Keep simple answers under 300 words.

### Common Metrics
- AOV (average order value): total revenue divided by number of orders.
- Repeat customer rate: customers with 2+ orders divided by all customers, times 100.
- Revenue: sum of total_price over orders.
- Units sold: sum of line_items quantity.

### Errors
- If the store cannot be reached: "I'm having trouble connecting to your store. Please try again later."
- If the question is ambiguous, ask a clarifying question."#;

/// Append-only record of model outputs and observations for one turn
#[derive(Debug, Clone, Default)]
pub struct Scratchpad {
    fragments: Vec<String>,
}

impl Scratchpad {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record raw model output.
    pub fn push_output(&mut self, output: &str) {
        self.fragments.push(format!("\n{}", output));
    }

    /// Record a tool observation.
    pub fn push_observation(&mut self, observation: &str) {
        self.fragments
            .push(format!("\n{} {}\n", OBSERVATION_MARKER, observation));
    }

    /// Number of fragments recorded
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// The scratchpad as prompt text
    pub fn as_text(&self) -> String {
        self.fragments.concat()
    }
}

/// Builds the fixed head of the prompt for a turn
pub struct PromptBuilder {
    catalogue: String,
    tool_names: String,
    today: NaiveDate,
    history_window: usize,
}

impl PromptBuilder {
    pub fn new(definitions: &[ToolDefinition], history_window: usize) -> Self {
        Self {
            catalogue: render_catalogue(definitions),
            tool_names: definitions
                .iter()
                .map(|d| d.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            today: chrono::Utc::now().date_naive(),
            history_window,
        }
    }

    /// Pin the date used in the policy text
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    /// Format the last `history_window` messages as `Human:`/`AI:` lines.
    pub fn format_history(&self, history: &[Message]) -> String {
        let start = history.len().saturating_sub(self.history_window);
        history[start..]
            .iter()
            .filter_map(|m| match m.role {
                Role::User => Some(format!("Human: {}\n", m.content)),
                Role::Assistant => Some(format!("AI: {}\n", m.content)),
                Role::System => None,
            })
            .collect()
    }

    /// The prompt without the scratchpad.
    pub fn build(&self, turn: &ConversationTurn) -> String {
        let policy = POLICY.replace("{today}", &self.today.format("%B %-d, %Y").to_string());
        format!(
            r#"{policy}

TOOLS:
------
You have access to the following tools:

{catalogue}

To use a tool, use the following format:

Thought: Do I need to use a tool? Yes
Action: the action to take, should be one of [{tool_names}]
Action Input: the input to the action
Observation: the result of the action

When you have a response for the user, or if you do not need to use a tool, you MUST use the format:

Thought: Do I need to use a tool? No
Final Answer: [your response here]

You must ALWAYS start your final response with "Final Answer:" or it will be lost.

Begin!

Previous conversation history:
{history}
New input: {message}
"#,
            policy = policy,
            catalogue = self.catalogue,
            tool_names = self.tool_names,
            history = self.format_history(&turn.history),
            message = turn.message,
        )
    }
}
