use std::fmt::Write as _;

use client_core::{DisputesSnapshot, DisputesState};
use shared::{domain::GameId, protocol::DisputeRecord};
use tracing::warn;
use url::Url;

use crate::html::escape;

const PLACEHOLDER: &str = "N/A";
pub const PAGE_TITLE: &str = "Super Admin - Manage Disputes";

/// Decides which screenshot URLs may be embedded in the page.
///
/// Only absolute http(s) URLs are rendered. When an allow-list is configured the
/// URL host must also be on it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImagePolicy {
    allowed_hosts: Vec<String>,
}

impl ImagePolicy {
    pub fn with_allowed_hosts<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed_hosts: hosts
                .into_iter()
                .map(|host| {
                    let host: String = host.into();
                    host.trim().to_ascii_lowercase()
                })
                .filter(|host| !host.is_empty())
                .collect(),
        }
    }

    pub fn permits(&self, image_url: &str) -> bool {
        let Ok(parsed) = Url::parse(image_url) else {
            return false;
        };
        if !matches!(parsed.scheme(), "http" | "https") {
            return false;
        }
        if self.allowed_hosts.is_empty() {
            return true;
        }
        parsed
            .host_str()
            .map(|host| self.allowed_hosts.iter().any(|allowed| allowed == host))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisputeCard {
    pub game_id: GameId,
    pub title: String,
    pub subtitle: String,
    pub score_line: Option<String>,
    pub image_url: Option<String>,
    pub comments: Vec<String>,
    pub resolving: bool,
}

impl DisputeCard {
    pub fn from_record(record: &DisputeRecord, resolving: bool, images: &ImagePolicy) -> Self {
        let school = record.school.as_deref().unwrap_or_default();
        let title = format!(
            "{} - {}",
            record.game_type.as_deref().unwrap_or_default(),
            record.map_or_code().unwrap_or(PLACEHOLDER)
        );
        let subtitle = format!(
            "{school} vs {} | {} | Game {}",
            record.opponent_name().unwrap_or(PLACEHOLDER),
            display_or_blank(record.week.as_ref()),
            display_or_blank(record.game_number.as_ref()),
        );
        let score_line = record.score().map(|(won, lost)| {
            format!(
                "Score: {school} {won} - {lost} {}",
                record.opponent.as_deref().unwrap_or_default()
            )
        });
        let image_url = record.image_url().and_then(|url| {
            if images.permits(url) {
                Some(url.to_string())
            } else {
                warn!(game_id = %record.game_id, "dropping untrusted screenshot url");
                None
            }
        });
        let comments = record
            .disputes
            .iter()
            .map(|c| format!("{} ({}): {}", c.username, c.school, c.comment))
            .collect();

        Self {
            game_id: record.game_id.clone(),
            title,
            subtitle,
            score_line,
            image_url,
            comments,
            resolving,
        }
    }

    pub fn render_html(&self) -> String {
        let game_id = escape(self.game_id.as_str());
        let mut out = format!("<section class=\"dispute-card\" data-game-id=\"{game_id}\">\n");
        let _ = writeln!(out, "<h2>{}</h2>", escape(&self.title));
        let _ = writeln!(out, "<p class=\"game-details\">{}</p>", escape(&self.subtitle));
        if let Some(score) = &self.score_line {
            let _ = writeln!(out, "<p class=\"score\">{}</p>", escape(score));
        }
        if let Some(image_url) = &self.image_url {
            let _ = writeln!(
                out,
                "<div class=\"screenshot\">\n<h3>Match Screenshot:</h3>\n<img src=\"{}\" alt=\"Game Screenshot\">\n</div>",
                escape(image_url)
            );
        }
        out.push_str("<div class=\"comments\">\n<h3>Dispute Comments:</h3>\n<ul>\n");
        for comment in &self.comments {
            let _ = writeln!(out, "<li>{}</li>", escape(comment));
        }
        out.push_str("</ul>\n</div>\n<div class=\"actions\">\n");
        let _ = writeln!(
            out,
            "<button data-action=\"review\" data-game-id=\"{game_id}\">Review &amp; Edit</button>"
        );
        let disabled = if self.resolving { " disabled" } else { "" };
        let _ = writeln!(
            out,
            "<button data-action=\"resolve\" data-game-id=\"{game_id}\"{disabled}>Resolve Dispute</button>"
        );
        out.push_str("</div>\n</section>");
        out
    }

    pub fn render_text(&self) -> String {
        let mut out = format!("[{}] {}\n  {}\n", self.game_id, self.title, self.subtitle);
        if let Some(score) = &self.score_line {
            let _ = writeln!(out, "  {score}");
        }
        if let Some(image_url) = &self.image_url {
            let _ = writeln!(out, "  Screenshot: {image_url}");
        }
        out.push_str("  Dispute Comments:\n");
        for comment in &self.comments {
            let _ = writeln!(out, "    - {comment}");
        }
        if self.resolving {
            out.push_str("  (resolve in progress)\n");
        }
        out
    }
}

fn display_or_blank<T: ToString>(value: Option<&T>) -> String {
    value.map(ToString::to_string).unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisputesPage {
    Loading,
    Failed { reason: String },
    Empty,
    Cards(Vec<DisputeCard>),
}

impl DisputesPage {
    pub fn from_snapshot(snapshot: &DisputesSnapshot, images: &ImagePolicy) -> Self {
        match &snapshot.state {
            DisputesState::Loading => DisputesPage::Loading,
            DisputesState::Failed { reason } => DisputesPage::Failed {
                reason: reason.clone(),
            },
            DisputesState::Loaded(disputes) if disputes.is_empty() => DisputesPage::Empty,
            DisputesState::Loaded(disputes) => DisputesPage::Cards(
                disputes
                    .iter()
                    .map(|record| {
                        DisputeCard::from_record(
                            record,
                            snapshot.is_in_flight(&record.game_id),
                            images,
                        )
                    })
                    .collect(),
            ),
        }
    }

    pub fn card_count(&self) -> usize {
        match self {
            DisputesPage::Cards(cards) => cards.len(),
            _ => 0,
        }
    }

    pub fn render_html(&self) -> String {
        match self {
            DisputesPage::Loading => {
                "<div class=\"loading\">Loading disputes...</div>".to_string()
            }
            DisputesPage::Failed { reason } => format!(
                "<main class=\"disputes\">\n<h1>{PAGE_TITLE}</h1>\n<p class=\"error\">Could not load disputes: {}</p>\n</main>",
                escape(reason)
            ),
            DisputesPage::Empty => format!(
                "<main class=\"disputes\">\n<h1>{PAGE_TITLE}</h1>\n<p>No disputes to review.</p>\n</main>"
            ),
            DisputesPage::Cards(cards) => {
                let mut out = format!("<main class=\"disputes\">\n<h1>{PAGE_TITLE}</h1>\n");
                for card in cards {
                    out.push_str(&card.render_html());
                    out.push('\n');
                }
                out.push_str("</main>");
                out
            }
        }
    }

    pub fn render_text(&self) -> String {
        match self {
            DisputesPage::Loading => "Loading disputes...\n".to_string(),
            DisputesPage::Failed { reason } => format!("Could not load disputes: {reason}\n"),
            DisputesPage::Empty => "No disputes to review.\n".to_string(),
            DisputesPage::Cards(cards) => cards
                .iter()
                .map(DisputeCard::render_text)
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use serde_json::json;

    use super::*;

    fn record(value: serde_json::Value) -> DisputeRecord {
        serde_json::from_value(value).expect("dispute record")
    }

    fn card(value: serde_json::Value) -> DisputeCard {
        DisputeCard::from_record(&record(value), false, &ImagePolicy::default())
    }

    fn snapshot(state: DisputesState, in_flight: &[&str]) -> DisputesSnapshot {
        DisputesSnapshot {
            state,
            in_flight: in_flight.iter().map(|id| GameId::new(*id)).collect::<BTreeSet<_>>(),
        }
    }

    #[test]
    fn card_uses_map_then_code_then_placeholder() {
        let with_map = card(json!({"gameId": "1", "gameType": "Valorant", "map": "Haven", "code": "X"}));
        let with_code = card(json!({"gameId": "2", "gameType": "Rocket League", "code": "RL-3"}));
        let neither = card(json!({"gameId": "3", "gameType": "Overwatch"}));

        assert_eq!(with_map.title, "Valorant - Haven");
        assert_eq!(with_code.title, "Rocket League - RL-3");
        assert_eq!(neither.title, "Overwatch - N/A");
    }

    #[test]
    fn subtitle_uses_placeholder_for_missing_opponent() {
        let card = card(json!({"gameId": "1", "school": "State", "week": "Week 4", "game_number": 2}));
        assert_eq!(card.subtitle, "State vs N/A | Week 4 | Game 2");
    }

    #[test]
    fn score_line_shown_for_zero_points() {
        let card = card(json!({
            "gameId": "1", "school": "State", "opponent": "Tech",
            "w_points": 0, "l_points": "3"
        }));
        assert_eq!(card.score_line.as_deref(), Some("Score: State 0 - 3 Tech"));
    }

    #[test]
    fn score_line_keeps_opponent_slot_when_opponent_missing() {
        let card = card(json!({"gameId": "1", "school": "State", "w_points": 2, "l_points": 1}));
        assert_eq!(card.score_line.as_deref(), Some("Score: State 2 - 1 "));
    }

    #[test]
    fn score_line_hidden_for_empty_string_points() {
        let card = card(json!({
            "gameId": "1", "school": "State", "opponent": "Tech",
            "w_points": "", "l_points": "3"
        }));
        assert_eq!(card.score_line, None);
        assert!(!card.render_html().contains("Score:"));
    }

    #[test]
    fn comments_are_attributed_to_name_and_school() {
        let card = card(json!({
            "gameId": "1",
            "disputes": [
                {"username": "coach_t", "school": "Tech", "comment": "wrong map"},
                {"username": "cap", "school": "State", "comment": "agreed"}
            ]
        }));
        assert_eq!(
            card.comments,
            vec!["coach_t (Tech): wrong map", "cap (State): agreed"]
        );
    }

    #[test]
    fn image_block_only_for_permitted_urls() {
        let https = card(json!({"gameId": "1", "image_url": "https://cdn.example.com/a.png"}));
        let script = card(json!({"gameId": "2", "image_url": "javascript:alert(1)"}));
        let missing = card(json!({"gameId": "3", "image_url": ""}));

        assert!(https.render_html().contains("<img src=\"https://cdn.example.com/a.png\""));
        assert_eq!(script.image_url, None);
        assert!(!script.render_html().contains("<img"));
        assert_eq!(missing.image_url, None);
    }

    #[test]
    fn image_policy_allow_list_matches_host() {
        let policy = ImagePolicy::with_allowed_hosts(["CDN.example.com"]);
        assert!(policy.permits("https://cdn.example.com/a.png"));
        assert!(!policy.permits("https://evil.example.net/a.png"));
        assert!(!policy.permits("/relative/a.png"));
    }

    #[test]
    fn resolving_card_disables_resolve_button() {
        let snapshot = snapshot(
            DisputesState::Loaded(vec![
                record(json!({"gameId": "g1"})),
                record(json!({"gameId": "g2"})),
            ]),
            &["g2"],
        );
        let page = DisputesPage::from_snapshot(&snapshot, &ImagePolicy::default());
        let DisputesPage::Cards(cards) = &page else {
            panic!("expected cards, got {page:?}");
        };
        assert!(!cards[0].resolving);
        assert!(cards[1].resolving);
        assert!(cards[1]
            .render_html()
            .contains("data-action=\"resolve\" data-game-id=\"g2\" disabled>"));
    }

    #[test]
    fn page_distinguishes_loading_empty_and_failed() {
        let images = ImagePolicy::default();
        let loading = DisputesPage::from_snapshot(&snapshot(DisputesState::Loading, &[]), &images);
        let empty =
            DisputesPage::from_snapshot(&snapshot(DisputesState::Loaded(Vec::new()), &[]), &images);
        let failed = DisputesPage::from_snapshot(
            &snapshot(
                DisputesState::Failed {
                    reason: "connection refused".into(),
                },
                &[],
            ),
            &images,
        );

        assert_eq!(loading.render_text(), "Loading disputes...\n");
        assert_eq!(empty.render_text(), "No disputes to review.\n");
        assert!(failed.render_html().contains("Could not load disputes: connection refused"));
        assert_eq!(empty.card_count(), 0);
        assert_eq!(failed.card_count(), 0);
    }

    #[test]
    fn page_renders_one_card_per_record() {
        let snapshot = snapshot(
            DisputesState::Loaded(vec![
                record(json!({"gameId": "a"})),
                record(json!({"gameId": "b"})),
                record(json!({"gameId": "c"})),
            ]),
            &[],
        );
        let page = DisputesPage::from_snapshot(&snapshot, &ImagePolicy::default());
        assert_eq!(page.card_count(), 3);
        assert_eq!(page.render_html().matches("<section").count(), 3);
    }
}
