//! The fixed troubleshooting transcript played by the mock backend.

use std::time::Duration;

use serde::Serialize;
use serde_json::{Value, json};

use crate::agent::message::ReturnType;
use crate::agent::parser::DONE_TOKEN;

/// How a step is sent.
pub enum Payload {
    /// One record carrying the whole value.
    Normal(Value),
    /// `begin`, one record per item, then `complete`.
    Stream(Vec<&'static str>),
}

pub struct Step {
    pub label: &'static str,
    pub payload: Payload,
}

/// One `data:` payload and the pause before it is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Emission {
    pub delay: Duration,
    pub data: String,
}

#[derive(Serialize)]
struct WireRecord<'a> {
    label: &'a str,
    content: &'a Value,
    return_type: ReturnType,
}

pub fn steps() -> Vec<Step> {
    vec![
        Step {
            label: "planning_agent_knowledge",
            payload: Payload::Normal(json!({
                "title": "ETH_LOS alarm knowledge",
                "sections": [
                    {
                        "subtitle": "Definition",
                        "content": "ETH_LOS (Ethernet Loss of Signal) means the port detects no valid signal at the physical layer."
                    },
                    {
                        "subtitle": "Common causes",
                        "content": [
                            "Broken fiber or bend radius too small",
                            "Faulty or mismatched optical module",
                            "Port misconfiguration",
                            "Device power fault"
                        ]
                    },
                    {
                        "subtitle": "Suggested handling",
                        "content": "1. Check fiber connection\n2. Check optical module\n3. Verify port configuration\n4. Read device logs"
                    }
                ]
            })),
        },
        Step {
            label: "planning_agent_troubleshooting_text",
            payload: Payload::Normal(Value::String(
                "Port 1/0/1 on PTN830 raised ETH_LOS, a physical layer loss of signal.\n\n\
                 Likely fault points:\n\
                 - physical link (70%): broken fiber, dirty connector, tight bend\n\
                 - optical module (20%): failed, mismatched or loose module\n\
                 - device port (10%): port fault or configuration error\n\n\
                 Plan: check the physical link, then the optical module, then the port configuration. \
                 These steps clear about 90% of ETH_LOS alarms."
                    .to_string(),
            )),
        },
        Step {
            label: "troubleshooting_agent_model_thinking",
            payload: Payload::Stream(vec![
                "Analyzing alarm type ETH_LOS...\n",
                "Physical layer alarm, selecting physical layer diagnostic APIs...\n",
                "Candidates: get_port_status, get_optical_power, get_port_statistics...\n",
                "Priority: 1.get_optical_power 2.get_port_status 3.get_port_statistics\n",
                "Building API call sequence...\n",
            ]),
        },
        Step {
            label: "troubleshooting_agent_refined_apis",
            payload: Payload::Stream(vec![
                "Selected diagnostic APIs:\n",
                "1. get_optical_power(device='PTN830', port='1/0/1')\n",
                "2. get_port_status(device='PTN830', port='1/0/1')\n",
                "3. get_port_statistics(device='PTN830', port='1/0/1')\n",
                "4. get_alarm_history(device='PTN830', port='1/0/1', type='ETH_LOS')\n",
                "5. get_device_log(device='PTN830', severity='ERROR', last_hours=24)\n",
            ]),
        },
        Step {
            label: "troubleshooting_agent_code_thinking",
            payload: Payload::Stream(vec![
                "Translating the plan into code...\n",
                "```python\n",
                "import network_api as api\n",
                "device, port = 'PTN830', '1/0/1'\n",
                "optical_power = api.get_optical_power(device, port)\n",
                "port_status = api.get_port_status(device, port)\n",
                "statistics = api.get_port_statistics(device, port)\n",
                "```\n",
                "Code ready, executing...\n",
            ]),
        },
        Step {
            label: "troubleshooting_agent_mock_status_done",
            payload: Payload::Normal(json!({
                "optical_power": { "rx_power": "-40 dBm", "tx_power": "2.3 dBm", "status": "RX_POWER_LOW" },
                "port_status": { "admin_state": "UP", "oper_state": "DOWN", "speed": "1000 Mbps", "duplex": "FULL" },
                "statistics": { "rx_packets": 0, "tx_packets": 15234, "rx_errors": 0, "tx_errors": 0 },
                "diagnosis": "Receive power too low (-40 dBm), expected -3 to -20 dBm"
            })),
        },
        Step {
            label: "summarizing_agent_result",
            payload: Payload::Normal(json!({
                "root_cause_analysis": {
                    "confidence": "95%",
                    "primary_cause": "Fault on the fiber receive direction",
                    "evidence": [
                        "Receive power abnormally low (-40 dBm)",
                        "Transmit power normal (2.3 dBm)",
                        "Port admin UP but oper DOWN",
                        "Packets only in the transmit direction"
                    ],
                    "recommendations": [
                        { "priority": "HIGH", "action": "Clean the receive side connector" },
                        { "priority": "MEDIUM", "action": "Replace the patch cord if cleaning fails" },
                        { "priority": "LOW", "action": "Check transmit power on the peer device" }
                    ]
                }
            })),
        },
        Step {
            label: "find_root_cause",
            payload: Payload::Normal(json!({
                "found": true,
                "confidence": 95,
                "root_cause": "Loss of signal caused by a fault on the receive fiber",
                "next_action": "proceed_to_solution"
            })),
        },
        Step {
            label: "final_summarizerr",
            payload: Payload::Normal(json!({
                "summary": "Diagnosis complete",
                "problem": "ETH_LOS on PTN830 port 1/0/1",
                "root_cause": "Receive direction lost signal, receive power -40 dBm",
                "solution": "1. Clean fiber connector\n2. Replace patch cord if needed\n3. Verify the peer device",
                "estimated_fix_time": "15-30 minutes",
                "prevention": "Monitor optical power against a baseline"
            })),
        },
    ]
}

/// Flattens the script into the payloads to write, in order, ending with
/// the `[DONE]` token.
pub fn timeline(stream_delay: Duration, step_delay: Duration) -> Vec<Emission> {
    let mut emissions = Vec::new();
    for step in steps() {
        match &step.payload {
            Payload::Normal(value) => {
                emissions.push(Emission {
                    delay: step_delay,
                    data: record(step.label, value, ReturnType::Normal),
                });
            }
            Payload::Stream(items) => {
                let marker = |content: &str, delay| Emission {
                    delay,
                    data: record(step.label, &Value::String(content.to_string()), ReturnType::Stream),
                };
                emissions.push(marker("begin", step_delay));
                for item in items {
                    emissions.push(marker(item, stream_delay));
                }
                emissions.push(marker("complete", stream_delay));
            }
        }
    }
    emissions.push(Emission {
        delay: Duration::ZERO,
        data: DONE_TOKEN.to_string(),
    });
    emissions
}

/// The whole script as SSE text, without delays.
pub fn render_transcript() -> String {
    timeline(Duration::ZERO, Duration::ZERO)
        .into_iter()
        .map(|emission| format!("data: {}\n\n", emission.data))
        .collect()
}

fn record(label: &str, content: &Value, return_type: ReturnType) -> String {
    let wire = WireRecord {
        label,
        content,
        return_type,
    };
    // serializing borrowed strings and a Value cannot fail
    serde_json::to_string(&wire).unwrap_or_default()
}
