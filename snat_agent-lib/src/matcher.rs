use std::fmt::{self, Display};

/// Location of a rule fragment inside a dump.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Position {
    Found(usize),
    NotFound,
}

impl Position {
    pub fn index(self) -> Option<usize> {
        match self {
            Position::Found(index) => Some(index),
            Position::NotFound => None,
        }
    }

    pub fn is_found(self) -> bool {
        matches!(self, Position::Found(_))
    }
}

impl From<Option<usize>> for Position {
    fn from(index: Option<usize>) -> Self {
        index.map_or(Position::NotFound, Position::Found)
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Position::Found(index) => write!(f, "{index}"),
            Position::NotFound => write!(f, "not found"),
        }
    }
}

/// Index of the first line containing `fragment` as a contiguous substring.
/// Later matches are never reported.
pub fn find_fragment<S: AsRef<str>>(fragment: &str, lines: &[S]) -> Position {
    lines.iter().position(|line| line.as_ref().contains(fragment)).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;

    const LINES: [&str; 5] = [
        "# Generated by iptables-save v1.6.0",
        "*nat",
        "-A POSTROUTING -s 172.17.0.0/16 ! -o docker0 -j MASQUERADE",
        "-A POSTROUTING ! -d 10.0.0.0/8 -m addrtype ! --dst-type LOCAL -j MASQUERADE",
        "-A POSTROUTING ! -d 10.0.0.0/8 -j RETURN",
    ];

    #[rstest]
    #[case("*nat", Position::Found(1))]
    #[case("-A POSTROUTING", Position::Found(2))]
    #[case("! -d 10.0.0.0/8", Position::Found(3))]
    #[case("docker0 -j", Position::Found(2))]
    #[case("-A PREROUTING", Position::NotFound)]
    fn first_matching_line_wins(#[case] fragment: &str, #[case] expected: Position) {
        assert_eq!(find_fragment(fragment, &LINES), expected);
    }

    #[test]
    fn empty_input_is_not_found() -> anyhow::Result<()> {
        let lines: [&str; 0] = [];
        assert_eq!(find_fragment("-A POSTROUTING", &lines), Position::NotFound);
        Ok(())
    }

    #[test]
    fn repeated_search_is_stable() -> anyhow::Result<()> {
        let first = find_fragment("MASQUERADE", &LINES);
        assert_eq!(first, find_fragment("MASQUERADE", &LINES));
        assert_eq!(first.index(), Some(2));
        Ok(())
    }

    #[test]
    fn counters_prefix_does_not_hide_rule() -> anyhow::Result<()> {
        let lines = ["[12:720] -A POSTROUTING ! -d 10.0.0.0/8 -j MASQUERADE"];
        assert!(find_fragment("-A POSTROUTING ! -d 10.0.0.0/8", &lines).is_found());
        Ok(())
    }
}
