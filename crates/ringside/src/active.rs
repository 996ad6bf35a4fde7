//! The active encoder property and surface direction vocabulary.
//!
//! The wire-level strings (`"send:3"`, `"left"`) are boundary concerns; call
//! sites inside the core work with these variants.

use std::fmt;

/// Which per-track property the surface's encoder bank currently addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActiveProperty {
    #[default]
    Volume,
    Panning,
    Send(usize),
    SelectedParameter,
}

impl ActiveProperty {
    /// Parse the dispatch-table string form. Returns `None` for anything
    /// unrecognized, including an unparseable send index.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "volume" => Some(ActiveProperty::Volume),
            "panning" => Some(ActiveProperty::Panning),
            "selected_parameter" => Some(ActiveProperty::SelectedParameter),
            _ => {
                let index = s.strip_prefix("send:")?;
                index.parse::<usize>().ok().map(ActiveProperty::Send)
            }
        }
    }
}

impl fmt::Display for ActiveProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActiveProperty::Volume => write!(f, "volume"),
            ActiveProperty::Panning => write!(f, "panning"),
            ActiveProperty::Send(i) => write!(f, "send:{}", i),
            ActiveProperty::SelectedParameter => write!(f, "selected_parameter"),
        }
    }
}

/// Horizontal ring navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingDirection {
    Left,
    Right,
}

impl RingDirection {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "left" => Some(RingDirection::Left),
            "right" => Some(RingDirection::Right),
            _ => None,
        }
    }

    pub fn delta(&self) -> i64 {
        match self {
            RingDirection::Left => -1,
            RingDirection::Right => 1,
        }
    }
}

/// Vertical scene navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneDirection {
    Up,
    Down,
}

impl SceneDirection {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "up" => Some(SceneDirection::Up),
            "down" => Some(SceneDirection::Down),
            _ => None,
        }
    }

    pub fn delta(&self) -> i64 {
        match self {
            SceneDirection::Up => -1,
            SceneDirection::Down => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trip() {
        for s in ["volume", "panning", "send:3", "selected_parameter"] {
            let parsed = ActiveProperty::parse(s).unwrap();
            assert_eq!(parsed.to_string(), s);
        }
    }

    #[test]
    fn test_malformed_strings_rejected() {
        assert_eq!(ActiveProperty::parse("send:"), None);
        assert_eq!(ActiveProperty::parse("send:x"), None);
        assert_eq!(ActiveProperty::parse("gain"), None);
    }

    #[test]
    fn test_direction_deltas() {
        assert_eq!(RingDirection::parse("left").unwrap().delta(), -1);
        assert_eq!(RingDirection::parse("right").unwrap().delta(), 1);
        assert_eq!(SceneDirection::parse("down").unwrap().delta(), 1);
        assert_eq!(RingDirection::parse("sideways"), None);
    }
}
