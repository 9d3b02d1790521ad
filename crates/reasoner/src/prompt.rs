//! Bounded-size prompt construction from an event.

use vantage_core::event::IntelligenceEvent;

/// Cap on the serialized payload section of a prompt.
const MAX_PAYLOAD_CHARS: usize = 2_000;

/// Render an event (and its context snapshot, if any) into a briefing the
/// reasoner can act on. Output size is bounded regardless of payload size.
pub fn build_event_prompt(event: &IntelligenceEvent) -> String {
    let payload = serde_json::to_string_pretty(&event.data).unwrap_or_else(|_| "{}".into());
    let payload = truncate(&payload, MAX_PAYLOAD_CHARS);

    let mut prompt = format!(
        "## Event briefing\n\
         type: {}\npriority: {}\nsource: {}\nobserved_at: {}\n\n\
         ## Payload\n{}\n",
        event.event_type,
        event.priority,
        event.source,
        event.timestamp.to_rfc3339(),
        payload,
    );

    if let Some(ref ctx) = event.context {
        prompt.push_str(&format!(
            "\n## Business context (snapshot at normalization)\n\
             cash_balance: {:.2}\nrunway_months: {:.1}\nmrr: {:.2}\n\
             churn_rate: {:.3}\nactive_customers: {}\n",
            ctx.cash_balance, ctx.runway_months, ctx.mrr, ctx.churn_rate, ctx.active_customers,
        ));
    }

    prompt.push_str("\nDecide on exactly one action and answer with the decision JSON.");
    prompt
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_chars).collect();
        format!("{cut}\n… [truncated]")
    }
}
