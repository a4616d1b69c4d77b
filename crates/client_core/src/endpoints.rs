//! URL construction for every backend operation.
//!
//! Resource identifiers are placed in the path as given. Search terms travel in
//! the query string and are percent-encoded (`a b` becomes `a%20b`).

use shared::domain::GameId;
use url::Url;

use crate::error::ClientError;

/// Base address of the stats backend, validated once and injected into clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    base_url: String,
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let raw = base_url.into();
        let trimmed = raw.trim().trim_end_matches('/').to_string();
        let parsed = Url::parse(&trimmed).map_err(|err| ClientError::InvalidBaseUrl {
            url: raw.clone(),
            reason: err.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ClientError::InvalidBaseUrl {
                url: raw,
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }
        Ok(Self { base_url: trimmed })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn directory(&self) -> EndpointDirectory {
        EndpointDirectory::new(self.base_url.clone())
    }
}

/// Logical backend operations, named after what they do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    PlayerStats { game: String, player: String },
    MatchStats { game: String, week: String },
    SeasonStats { game: String, week: String },
    UploadFile,
    UploadMatch,
    UpdateWeekAndSeason,
    AllDisputes,
    ResolveDispute { game_id: GameId },
    SubmitDispute { game: String },
    Login,
    Accounts,
    Roster { game: String },
    RosterForSchool { game: String, school: String },
    Schools,
    Picture { game: String, game_id: String },
}

impl Endpoint {
    pub const OPERATIONS: &'static [&'static str] = &[
        "player_stats",
        "match_stats",
        "season_stats",
        "upload_file",
        "upload_match",
        "update_week_and_season",
        "all_disputes",
        "resolve_dispute",
        "submit_dispute",
        "login",
        "accounts",
        "roster",
        "roster_for_school",
        "schools",
        "picture",
    ];

    /// Builds an endpoint from an operation name and its positional arguments.
    pub fn from_operation(operation: &str, args: &[String]) -> Result<Self, ClientError> {
        let arity = |expected: usize| -> Result<(), ClientError> {
            if args.len() == expected {
                Ok(())
            } else {
                Err(ClientError::EndpointArguments {
                    operation: operation.to_string(),
                    expected,
                    actual: args.len(),
                })
            }
        };
        let arg = |index: usize| args[index].clone();

        let endpoint = match operation {
            "player_stats" => {
                arity(2)?;
                Endpoint::PlayerStats {
                    game: arg(0),
                    player: arg(1),
                }
            }
            "match_stats" => {
                arity(2)?;
                Endpoint::MatchStats {
                    game: arg(0),
                    week: arg(1),
                }
            }
            "season_stats" => {
                arity(2)?;
                Endpoint::SeasonStats {
                    game: arg(0),
                    week: arg(1),
                }
            }
            "upload_file" => {
                arity(0)?;
                Endpoint::UploadFile
            }
            "upload_match" => {
                arity(0)?;
                Endpoint::UploadMatch
            }
            "update_week_and_season" => {
                arity(0)?;
                Endpoint::UpdateWeekAndSeason
            }
            "all_disputes" => {
                arity(0)?;
                Endpoint::AllDisputes
            }
            "resolve_dispute" => {
                arity(1)?;
                Endpoint::ResolveDispute {
                    game_id: GameId::new(arg(0)),
                }
            }
            "submit_dispute" => {
                arity(1)?;
                Endpoint::SubmitDispute { game: arg(0) }
            }
            "login" => {
                arity(0)?;
                Endpoint::Login
            }
            "accounts" => {
                arity(0)?;
                Endpoint::Accounts
            }
            "roster" => {
                arity(1)?;
                Endpoint::Roster { game: arg(0) }
            }
            "roster_for_school" => {
                arity(2)?;
                Endpoint::RosterForSchool {
                    game: arg(0),
                    school: arg(1),
                }
            }
            "schools" => {
                arity(0)?;
                Endpoint::Schools
            }
            "picture" => {
                arity(2)?;
                Endpoint::Picture {
                    game: arg(0),
                    game_id: arg(1),
                }
            }
            other => return Err(ClientError::UnknownOperation(other.to_string())),
        };
        Ok(endpoint)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointDirectory {
    base_url: String,
}

impl EndpointDirectory {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, endpoint: &Endpoint) -> String {
        match endpoint {
            Endpoint::PlayerStats { game, player } => self.player_stats(game, player),
            Endpoint::MatchStats { game, week } => self.match_stats(game, week),
            Endpoint::SeasonStats { game, week } => self.season_stats(game, week),
            Endpoint::UploadFile => self.upload_file(),
            Endpoint::UploadMatch => self.upload_match(),
            Endpoint::UpdateWeekAndSeason => self.update_week_and_season(),
            Endpoint::AllDisputes => self.all_disputes(),
            Endpoint::ResolveDispute { game_id } => self.resolve_dispute(game_id),
            Endpoint::SubmitDispute { game } => self.submit_dispute(game),
            Endpoint::Login => self.login(),
            Endpoint::Accounts => self.accounts(),
            Endpoint::Roster { game } => self.roster(game),
            Endpoint::RosterForSchool { game, school } => self.roster_for_school(game, school),
            Endpoint::Schools => self.schools(),
            Endpoint::Picture { game, game_id } => self.picture(game, game_id),
        }
    }

    pub fn player_stats(&self, game: &str, player: &str) -> String {
        self.with_query(&format!("player/{game}"), "player", player)
    }

    pub fn match_stats(&self, game: &str, week: &str) -> String {
        self.with_query(&format!("match_stats/{game}"), "week", week)
    }

    pub fn season_stats(&self, game: &str, week: &str) -> String {
        self.with_query(&format!("season_stats/{game}"), "week", week)
    }

    pub fn upload_file(&self) -> String {
        self.path("upload_file")
    }

    pub fn upload_match(&self) -> String {
        self.path("upload_match")
    }

    pub fn update_week_and_season(&self) -> String {
        self.path("update_week_and_season")
    }

    pub fn all_disputes(&self) -> String {
        self.path("get_all_disputes")
    }

    /// Game ids are URL-safe backend identifiers and are embedded unencoded.
    pub fn resolve_dispute(&self, game_id: &GameId) -> String {
        self.path(&format!("resolve_dispute/{game_id}"))
    }

    pub fn submit_dispute(&self, game: &str) -> String {
        self.path(&format!("submit_dispute/{game}"))
    }

    pub fn login(&self) -> String {
        self.path("login")
    }

    /// Shared by account listing, creation, password change and deletion.
    pub fn accounts(&self) -> String {
        self.path("accounts")
    }

    /// Shared by roster submission and deletion.
    pub fn roster(&self, game: &str) -> String {
        self.path(&format!("roster/{game}"))
    }

    pub fn roster_for_school(&self, game: &str, school: &str) -> String {
        self.with_query(&format!("roster/{game}"), "school", school)
    }

    pub fn schools(&self) -> String {
        self.path("schools")
    }

    pub fn picture(&self, game: &str, game_id: &str) -> String {
        self.with_query(&format!("get_upload/{game}"), "game_id", game_id)
    }

    fn path(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    fn with_query(&self, path: &str, key: &str, value: &str) -> String {
        format!("{}?{key}={}", self.path(path), urlencoding::encode(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "http://127.0.0.1:8080";

    fn directory() -> EndpointDirectory {
        EndpointDirectory::new(BASE)
    }

    #[test]
    fn resolve_dispute_embeds_id_as_last_segment() {
        assert_eq!(
            directory().resolve_dispute(&GameId::new("42")),
            "http://127.0.0.1:8080/resolve_dispute/42"
        );
    }

    #[test]
    fn query_values_are_percent_encoded_but_paths_are_not() {
        assert_eq!(
            directory().player_stats("valorant", "a b"),
            "http://127.0.0.1:8080/player/valorant?player=a%20b"
        );
        assert_eq!(
            directory().roster_for_school("rocket league", "A&M"),
            "http://127.0.0.1:8080/roster/rocket league?school=A%26M"
        );
    }

    #[test]
    fn week_and_picture_queries() {
        let dir = directory();
        assert_eq!(
            dir.match_stats("valorant", "Week 3"),
            "http://127.0.0.1:8080/match_stats/valorant?week=Week%203"
        );
        assert_eq!(
            dir.season_stats("valorant", "5"),
            "http://127.0.0.1:8080/season_stats/valorant?week=5"
        );
        assert_eq!(
            dir.picture("overwatch", "g/1"),
            "http://127.0.0.1:8080/get_upload/overwatch?game_id=g%2F1"
        );
    }

    #[test]
    fn trailing_slash_on_base_is_ignored() {
        let dir = EndpointDirectory::new("http://stats.local/");
        assert_eq!(dir.all_disputes(), "http://stats.local/get_all_disputes");
    }

    #[test]
    fn url_by_operation_matches_direct_builders() {
        let dir = directory();
        let args = vec!["valorant".to_string(), "a b".to_string()];
        let endpoint = Endpoint::from_operation("player_stats", &args).expect("endpoint");
        assert_eq!(dir.url(&endpoint), dir.player_stats("valorant", "a b"));

        for operation in Endpoint::OPERATIONS {
            let args: Vec<String> = (0..2).map(|i| format!("arg{i}")).collect();
            let built = (0..=2)
                .find_map(|n| Endpoint::from_operation(operation, &args[..n]).ok());
            assert!(built.is_some(), "operation {operation} should be constructible");
        }
    }

    #[test]
    fn every_operation_maps_to_its_backend_path() {
        let dir = directory();
        let cases = [
            ("player_stats", vec!["valorant", "ace"], "/player/valorant?player=ace"),
            ("match_stats", vec!["valorant", "3"], "/match_stats/valorant?week=3"),
            ("season_stats", vec!["valorant", "3"], "/season_stats/valorant?week=3"),
            ("upload_file", vec![], "/upload_file"),
            ("upload_match", vec![], "/upload_match"),
            ("update_week_and_season", vec![], "/update_week_and_season"),
            ("all_disputes", vec![], "/get_all_disputes"),
            ("resolve_dispute", vec!["42"], "/resolve_dispute/42"),
            ("submit_dispute", vec!["overwatch"], "/submit_dispute/overwatch"),
            ("login", vec![], "/login"),
            ("accounts", vec![], "/accounts"),
            ("roster", vec!["valorant"], "/roster/valorant"),
            ("roster_for_school", vec!["valorant", "State"], "/roster/valorant?school=State"),
            ("schools", vec![], "/schools"),
            ("picture", vec!["overwatch", "g1"], "/get_upload/overwatch?game_id=g1"),
        ];
        assert_eq!(cases.len(), Endpoint::OPERATIONS.len());

        for (operation, args, path) in cases {
            let args: Vec<String> = args.into_iter().map(String::from).collect();
            let endpoint = Endpoint::from_operation(operation, &args).expect("endpoint");
            assert_eq!(dir.url(&endpoint), format!("{BASE}{path}"), "operation {operation}");
        }
    }

    #[test]
    fn from_operation_rejects_wrong_arity_and_unknown_names() {
        let err = Endpoint::from_operation("resolve_dispute", &[]).expect_err("arity");
        assert!(matches!(
            err,
            ClientError::EndpointArguments {
                expected: 1,
                actual: 0,
                ..
            }
        ));
        let err = Endpoint::from_operation("drop_tables", &[]).expect_err("unknown");
        assert!(matches!(err, ClientError::UnknownOperation(_)));
    }

    #[test]
    fn api_config_rejects_non_http_bases() {
        assert!(ApiConfig::new("ftp://stats.local").is_err());
        assert!(ApiConfig::new("not a url").is_err());
        let config = ApiConfig::new(" https://stats.local/ ").expect("config");
        assert_eq!(config.base_url(), "https://stats.local");
        assert_eq!(
            config.directory().schools(),
            "https://stats.local/schools"
        );
    }
}
