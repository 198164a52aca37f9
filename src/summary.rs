//! Placeholder meeting summaries until a real model is wired in. The
//! same meeting always gets the same summary.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::calendar::Meeting;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MockAiSummary {
    pub id: String,
    pub meeting_id: String,
    pub summary: String,
    pub key_points: Vec<String>,
    pub action_items: Vec<String>,
    pub details: String,
    pub created_at: DateTime<Utc>,
}

struct Template {
    summary: fn(&str, usize) -> String,
    key_points: [&'static str; 4],
    action_items: [&'static str; 4],
}

const TEMPLATES: [Template; 5] = [
    Template {
        summary: |title, _| {
            format!(
                "This meeting focused on {title}. Key decisions were made regarding project timelines and resource allocation. The team agreed to follow up on action items within the next week."
            )
        },
        key_points: [
            "Reviewed Q4 project milestones and deliverables",
            "Discussed resource allocation for upcoming sprint",
            "Aligned on communication protocols with stakeholders",
            "Identified potential risks and mitigation strategies",
        ],
        action_items: [
            "Follow up with design team on mockups by Friday",
            "Schedule stakeholder review session next week",
            "Update project timeline in project management tool",
            "Prepare risk assessment document",
        ],
    },
    Template {
        summary: |title, _| {
            format!(
                "During this {title} session, participants discussed strategic planning and identified several opportunities for improvement. A follow-up meeting was scheduled to review progress."
            )
        },
        key_points: [
            "Sprint velocity increased by 15% this quarter",
            "Successfully resolved critical infrastructure issues",
            "New team member onboarding completed",
            "Client feedback incorporation strategy finalized",
        ],
        action_items: [
            "Implement new testing framework by month-end",
            "Organize team building event for Q1",
            "Create documentation for new processes",
            "Schedule quarterly performance reviews",
        ],
    },
    Template {
        summary: |title, _| {
            format!(
                "The {title} covered important updates on current initiatives. Team members shared progress reports and collaborated on solutions for identified challenges."
            )
        },
        key_points: [
            "Feature development on track for beta release",
            "Cross-functional collaboration improved significantly",
            "User feedback analysis completed",
            "Technical debt reduction plan approved",
        ],
        action_items: [
            "Coordinate with QA team for beta testing",
            "Implement user feedback in next iteration",
            "Schedule architecture review session",
            "Update deployment pipeline documentation",
        ],
    },
    Template {
        summary: |title, _| {
            format!(
                "This productive {title} session resulted in clear action items and next steps. The team demonstrated strong collaboration and problem-solving skills."
            )
        },
        key_points: [
            "Market research findings presented and analyzed",
            "Competitive landscape assessment completed",
            "Growth strategy for next quarter outlined",
            "Budget allocation for new initiatives approved",
        ],
        action_items: [
            "Finalize go-to-market strategy document",
            "Schedule customer interview sessions",
            "Prepare investor presentation for next board meeting",
            "Research new technology partnerships",
        ],
    },
    Template {
        summary: |title, attendees| {
            format!(
                "The {title} meeting was well-attended with {attendees} participants. Key topics included project milestones, budget considerations, and stakeholder communication."
            )
        },
        key_points: [
            "Code review process efficiency improved",
            "Technical challenges in scaling addressed",
            "Team skill development plan created",
            "New tools and technologies evaluated",
        ],
        action_items: [
            "Implement new code review guidelines",
            "Schedule technical training sessions",
            "Evaluate and pilot new development tools",
            "Create knowledge sharing initiative",
        ],
    },
];

/// Template index: the sum of the id's UTF-16 code units modulo the
/// number of templates
pub fn template_index(meeting_id: &str) -> usize {
    let sum: u64 = meeting_id.encode_utf16().map(u64::from).sum();
    (sum % TEMPLATES.len() as u64) as usize
}

fn attendee_names(meeting: &Meeting) -> String {
    let names = meeting
        .attendees
        .iter()
        .take(3)
        .map(|a| a.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let rest = meeting.attendees.len().saturating_sub(3);
    if rest > 0 {
        format!("{names} and {rest} others")
    } else {
        names
    }
}

fn details(meeting: &Meeting) -> String {
    format!(
        "**Meeting Summary: {title}**\n\n\
         **Duration:** {duration} minutes\n\
         **Attendees:** {attendees}\n\n\
         **Key Discussion Points:**\n\
         • Project status updates and milestone tracking\n\
         • Resource allocation and budget considerations\n\
         • Risk assessment and mitigation strategies\n\
         • Next steps and action items\n\n\
         **Decisions Made:**\n\
         • Approved the proposed timeline for Q2 deliverables\n\
         • Allocated additional resources to high-priority tasks\n\
         • Scheduled follow-up meetings for ongoing initiatives\n\n\
         **Action Items:**\n\
         • Team leads to provide weekly progress reports\n\
         • Budget review meeting scheduled for next month\n\
         • Stakeholder communication plan to be finalized\n\n\
         **Next Meeting:** Follow-up session planned for next week to review progress on action items.",
        title = meeting.title,
        duration = meeting.duration,
        attendees = attendee_names(meeting),
    )
}

pub fn generate_summary(meeting: &Meeting, now: DateTime<Utc>) -> MockAiSummary {
    let template = &TEMPLATES[template_index(&meeting.id)];
    let title = meeting.title.to_lowercase();

    MockAiSummary {
        id: format!("summary-{}-{}", meeting.id, now.timestamp_millis()),
        meeting_id: meeting.id.clone(),
        summary: (template.summary)(&title, meeting.attendees.len()),
        key_points: template.key_points.iter().map(|s| s.to_string()).collect(),
        action_items: template.action_items.iter().map(|s| s.to_string()).collect(),
        details: details(meeting),
        created_at: now,
    }
}
