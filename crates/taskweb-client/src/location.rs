//! Board location carried in the URL query (`?board=<id>`).

use taskweb_types::BoardId;

use crate::constants::BOARD_QUERY_PARAM;

/// Which board, if any, the URL points at.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BoardLocation {
    pub board: Option<BoardId>,
}

impl BoardLocation {
    pub fn none() -> Self {
        Self { board: None }
    }

    pub fn board(id: BoardId) -> Self {
        Self { board: Some(id) }
    }

    /// Parse a query string or a full URL. Anything before `?` and after `#`
    /// is ignored; a missing or malformed board ID yields no board.
    pub fn from_query(url: &str) -> Self {
        let query = url.split_once('?').map_or(url, |(_, q)| q);
        let query = query.split_once('#').map_or(query, |(q, _)| q);

        let board = query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| *key == BOARD_QUERY_PARAM)
            .and_then(|(_, value)| BoardId::parse(value).ok());
        Self { board }
    }

    /// `?board=<id>`, or an empty string for no board.
    pub fn to_query(&self) -> String {
        match self.board {
            Some(id) => format!("?{BOARD_QUERY_PARAM}={id}"),
            None => String::new(),
        }
    }

    /// Link that opens this board for another user.
    pub fn share_link(&self, base: &str) -> Option<String> {
        let base = base.split_once('?').map_or(base, |(b, _)| b);
        self.board.map(|_| format!("{base}{}", self.to_query()))
    }
}

/// Browser-history navigation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NavEvent {
    /// The user picked one of their boards; the URL gets a new entry.
    Push(BoardId),
    /// Back/forward landed on `location`, which may be a shared link.
    Pop(BoardLocation),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_round_trip() {
        let id = BoardId::new();
        let location = BoardLocation::board(id);
        assert_eq!(BoardLocation::from_query(&location.to_query()), location);
    }

    #[test]
    fn test_from_full_url_with_other_params() {
        let id = BoardId::new();
        let url = format!("https://tasks.example/app/?tab=x&board={id}#top");
        assert_eq!(BoardLocation::from_query(&url).board, Some(id));
    }

    #[test]
    fn test_malformed_or_missing() {
        assert_eq!(BoardLocation::from_query("?board=garbage"), BoardLocation::none());
        assert_eq!(BoardLocation::from_query(""), BoardLocation::none());
        assert_eq!(BoardLocation::none().to_query(), "");
    }

    #[test]
    fn test_share_link_replaces_existing_query() {
        let id = BoardId::new();
        let link = BoardLocation::board(id).share_link("https://tasks.example/?board=old").unwrap();
        assert_eq!(link, format!("https://tasks.example/?board={id}"));
        assert_eq!(BoardLocation::none().share_link("https://tasks.example/"), None);
    }
}
