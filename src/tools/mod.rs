// Each tool is independent; they share only the error type, config and utils.
pub mod convert;
pub mod covid;
pub mod duplicates;
pub mod ip_region;
pub mod md5_match;
pub mod otp_qr;
