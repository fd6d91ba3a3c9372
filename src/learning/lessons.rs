//! Lesson Generator
//!
//! Turns a failed query's error text into a short remediation note that is fed
//! back to the planner on later investigations.

pub const DEFAULT_LESSON: &str = "Query failed - need to improve schema understanding";

/// (needle, lesson) pairs, checked in order.
const LESSONS: &[(&str, &str)] = &[
    (
        r#"column "state""#,
        "Use 'instance_state' instead of 'state' for EC2 instance queries",
    ),
    (
        r#"column "running""#,
        "Use 'instance_state = \"running\"' instead of 'running' column",
    ),
    (
        "group_id",
        "Use JSONB operators for security group fields: sg->>'GroupId'",
    ),
];

pub fn lesson_for_error(message: &str) -> String {
    LESSONS
        .iter()
        .find(|(needle, _)| message.contains(needle))
        .map(|(_, lesson)| lesson.to_string())
        .unwrap_or_else(|| DEFAULT_LESSON.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_lessons() {
        assert_eq!(
            lesson_for_error(r#"ERROR: column "state" does not exist"#),
            "Use 'instance_state' instead of 'state' for EC2 instance queries"
        );
        assert_eq!(
            lesson_for_error(r#"column "running" does not exist"#),
            "Use 'instance_state = \"running\"' instead of 'running' column"
        );
        assert_eq!(
            lesson_for_error("column sg.group_id does not exist"),
            "Use JSONB operators for security group fields: sg->>'GroupId'"
        );
    }

    #[test]
    fn test_default_lesson() {
        assert_eq!(lesson_for_error("relation does not exist"), DEFAULT_LESSON);
    }
}
