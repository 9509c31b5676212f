//! Per-call prompt assembly.

use dispatch_records::AgentConfig;

/// The driver and load a call is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallContext {
    pub driver_name: String,
    pub load_number: String,
}

const EMERGENCY_PROTOCOL: &str = "When an emergency is detected:
1. Acknowledge the emergency immediately
2. Ask for their exact location with mile markers if possible
3. Determine the type of emergency (accident, breakdown, medical, other)
4. Gather any additional safety information
5. Assure them that a human dispatcher will call them back immediately
6. End the call quickly";

const RESPONSE_GUIDELINES: &str = "RESPONSE GUIDELINES:
- Keep responses concise and professional
- Ask one question at a time
- If you get unclear responses, ask for clarification up to 2 times
- If the driver is uncooperative or unresponsive, politely end the call
- Always maintain a helpful and professional tone";

/// Builds the agent prompt for one call: the config's system prompt followed
/// by call context, conversation flow, emergency triggers and protocol, and
/// response guidelines.
pub fn build_dynamic_prompt(config: &AgentConfig, context: &CallContext) -> String {
    format!(
        "{base}

CALL CONTEXT:
- Driver Name: {driver}
- Load Number: {load}
- Call Purpose: Status update and check-in

CONVERSATION FLOW:
{flow}

EMERGENCY DETECTION:
If you hear any of these words or phrases, immediately switch to emergency protocol: {triggers}

{protocol}

{guidelines}",
        base = config.system_prompt,
        driver = context.driver_name,
        load = context.load_number,
        flow = config.conversation_flow,
        triggers = config.emergency_triggers.join(", "),
        protocol = EMERGENCY_PROTOCOL,
        guidelines = RESPONSE_GUIDELINES,
    )
}

/// The first thing the agent says when the driver picks up.
pub fn begin_message(context: &CallContext) -> String {
    format!(
        "Hi {}, this is Dispatch with a check call on load {}. Can you give me an update on your status?",
        context.driver_name, context.load_number
    )
}
