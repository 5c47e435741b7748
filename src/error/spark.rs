//! Error codes carried in the `header.code` field of Spark response frames.

use std::fmt;

use super::unified::ErrorCategory;

/// A nonzero Spark frame code.
///
/// Every documented code has its own variant; anything else the service sends
/// is kept verbatim in [`SparkErrorCode::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SparkErrorCode {
    UpgradeToWebsocketFailed,
    ReadUserMessageFailed,
    SendUserMessageFailed,
    MessageFormatIncorrect,
    SchemaIncorrect,
    ParamsIncorrect,
    ConcurrentConnection,
    NetworkFlowLimited,
    CapacityInsufficient,
    EngineConnectFailed,
    EngineReceiveFailed,
    EngineSendFailed,
    EngineInternal,
    InputContentRejected,
    OutputContentRejected,
    AppIdBlacklisted,
    AppIdUnauthorized,
    ClearHistoryFailed,
    ContentViolationTendency,
    ServerBusy,
    EngineParamsInvalid,
    EngineNetworkError,
    TokenLimitExceeded,
    NoAuthorization,
    DailyLimitExceeded,
    QpsLimitExceeded,
    ConcurrencyLimitExceeded,
    Other(i64),
}

const KNOWN_CODES: [(i64, SparkErrorCode, &str); 27] = [
    (10000, SparkErrorCode::UpgradeToWebsocketFailed, "upgrade to websocket failed"),
    (10001, SparkErrorCode::ReadUserMessageFailed, "read message from user failed"),
    (10002, SparkErrorCode::SendUserMessageFailed, "send message to user failed"),
    (10003, SparkErrorCode::MessageFormatIncorrect, "incorrect format of user message"),
    (10004, SparkErrorCode::SchemaIncorrect, "incorrect schema of user message"),
    (10005, SparkErrorCode::ParamsIncorrect, "incorrect parameter values"),
    (10006, SparkErrorCode::ConcurrentConnection, "connection already exists for this user"),
    (10007, SparkErrorCode::NetworkFlowLimited, "previous answer still in progress"),
    (10008, SparkErrorCode::CapacityInsufficient, "service capacity insufficient"),
    (10009, SparkErrorCode::EngineConnectFailed, "failed to connect to engine"),
    (10010, SparkErrorCode::EngineReceiveFailed, "failed to receive data from engine"),
    (10011, SparkErrorCode::EngineSendFailed, "failed to send data to engine"),
    (10012, SparkErrorCode::EngineInternal, "engine internal error"),
    (10013, SparkErrorCode::InputContentRejected, "input rejected by content review"),
    (10014, SparkErrorCode::OutputContentRejected, "output rejected by content review"),
    (10015, SparkErrorCode::AppIdBlacklisted, "app id is blacklisted"),
    (10016, SparkErrorCode::AppIdUnauthorized, "app id authorization error"),
    (10017, SparkErrorCode::ClearHistoryFailed, "clear history failed"),
    (10019, SparkErrorCode::ContentViolationTendency, "conversation tends towards violating content"),
    (10110, SparkErrorCode::ServerBusy, "server is busy"),
    (10163, SparkErrorCode::EngineParamsInvalid, "engine parameter schema check failed"),
    (10222, SparkErrorCode::EngineNetworkError, "engine network error"),
    (10907, SparkErrorCode::TokenLimitExceeded, "history and question exceed the token limit"),
    (11200, SparkErrorCode::NoAuthorization, "no authorization for this feature"),
    (11201, SparkErrorCode::DailyLimitExceeded, "daily request limit exceeded"),
    (11202, SparkErrorCode::QpsLimitExceeded, "per-second request limit exceeded"),
    (11203, SparkErrorCode::ConcurrencyLimitExceeded, "concurrency limit exceeded"),
];

impl SparkErrorCode {
    /// Resolve a frame code. Returns `None` for `0` (success).
    pub fn from_code(code: i64) -> Option<Self> {
        if code == 0 {
            return None;
        }
        let known = KNOWN_CODES
            .iter()
            .find(|(value, _, _)| *value == code)
            .map(|(_, variant, _)| *variant);
        Some(known.unwrap_or(Self::Other(code)))
    }

    /// The numeric wire code.
    pub fn code(&self) -> i64 {
        if let Self::Other(code) = self {
            return *code;
        }
        KNOWN_CODES
            .iter()
            .find(|(_, variant, _)| variant == self)
            .map(|(value, _, _)| *value)
            .unwrap_or_default()
    }

    pub fn description(&self) -> &'static str {
        KNOWN_CODES
            .iter()
            .find(|(_, variant, _)| variant == self)
            .map(|(_, _, text)| *text)
            .unwrap_or("unknown spark error")
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::AppIdBlacklisted | Self::AppIdUnauthorized | Self::NoAuthorization => {
                ErrorCategory::Authentication
            }
            Self::NetworkFlowLimited
            | Self::ConcurrentConnection
            | Self::DailyLimitExceeded
            | Self::QpsLimitExceeded
            | Self::ConcurrencyLimitExceeded => ErrorCategory::RateLimit,
            Self::InputContentRejected
            | Self::OutputContentRejected
            | Self::ContentViolationTendency => ErrorCategory::ContentSafety,
            Self::CapacityInsufficient | Self::ServerBusy | Self::TokenLimitExceeded => {
                ErrorCategory::Capacity
            }
            Self::MessageFormatIncorrect
            | Self::SchemaIncorrect
            | Self::ParamsIncorrect
            | Self::EngineParamsInvalid => ErrorCategory::MalformedRequest,
            Self::UpgradeToWebsocketFailed
            | Self::ReadUserMessageFailed
            | Self::SendUserMessageFailed
            | Self::EngineConnectFailed
            | Self::EngineReceiveFailed
            | Self::EngineSendFailed
            | Self::EngineInternal
            | Self::ClearHistoryFailed
            | Self::EngineNetworkError => ErrorCategory::EngineInternal,
            Self::Other(_) => ErrorCategory::Unknown,
        }
    }
}

impl fmt::Display for SparkErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description(), self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_known_code_round_trips() {
        for (value, variant, _) in KNOWN_CODES {
            assert_eq!(SparkErrorCode::from_code(value), Some(variant));
            assert_eq!(variant.code(), value);
        }
    }

    #[test]
    fn zero_is_success() {
        assert_eq!(SparkErrorCode::from_code(0), None);
    }

    #[test]
    fn unknown_codes_are_preserved() {
        let code = SparkErrorCode::from_code(12345).unwrap();
        assert_eq!(code, SparkErrorCode::Other(12345));
        assert_eq!(code.code(), 12345);
        assert_eq!(code.category(), ErrorCategory::Unknown);
    }

    #[test]
    fn daily_limit_is_rate_limit() {
        let code = SparkErrorCode::from_code(11201).unwrap();
        assert_eq!(code, SparkErrorCode::DailyLimitExceeded);
        assert_eq!(code.category(), ErrorCategory::RateLimit);
        assert_eq!(code.to_string(), "daily request limit exceeded (11201)");
    }
}
