#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientRole {
    Display,
    Operator,
    Sensor,
}

impl ClientRole {
    pub fn may_command(self) -> bool {
        self == Self::Operator
    }

    pub fn may_report(self) -> bool {
        matches!(self, Self::Operator | Self::Sensor)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Display => "display",
            Self::Operator => "operator",
            Self::Sensor => "sensor",
        }
    }
}

pub fn parse_role(raw: Option<&str>) -> Option<ClientRole> {
    match raw {
        None => Some(ClientRole::Display),
        Some(value) => match value.trim().to_ascii_lowercase().as_str() {
            "display" => Some(ClientRole::Display),
            "operator" => Some(ClientRole::Operator),
            "sensor" => Some(ClientRole::Sensor),
            _ => None,
        },
    }
}

pub fn parse_limit(raw: Option<&str>) -> Option<usize> {
    raw.and_then(|value| value.parse::<usize>().ok())
}
