use crate::base::loadstate::LoadState;
use crate::base::neterror::{ErrorKind, NetError};

#[test]
fn test_net_error_roundtrip() {
    let original = NetError::ConnectionRefused;
    let code = original.as_i32();
    assert_eq!(code, -102);
    let converted = NetError::from(code);
    assert!(matches!(converted, NetError::ConnectionRefused));

    let redirects = NetError::TooManyRedirects;
    assert_eq!(redirects.as_i32(), -310);
    assert!(matches!(
        NetError::from(redirects.as_i32()),
        NetError::TooManyRedirects
    ));
}

#[test]
fn test_unknown_error() {
    let err = NetError::from(-9999);
    assert!(matches!(err, NetError::Unknown(-9999)));
}

#[test]
fn test_error_kinds() {
    assert_eq!(NetError::ConnectionRefused.kind(), ErrorKind::ConnectionFailed);
    assert_eq!(
        NetError::CertificateNameMismatch {
            host: "example.com".into(),
            reason: "hostname mismatch".into(),
        }
        .kind(),
        ErrorKind::TlsIdentityMismatch
    );
    assert_eq!(NetError::TimedOut.kind(), ErrorKind::Timeout);
    assert_eq!(NetError::TooManyRedirects.kind(), ErrorKind::TooManyRedirects);
    assert_eq!(
        NetError::InvalidHttpResponse.kind(),
        ErrorKind::MalformedResponse
    );
    assert_eq!(NetError::Aborted.kind(), ErrorKind::Cancelled);
    assert_eq!(NetError::NameNotResolved.kind(), ErrorKind::ResolutionUnavailable);
    assert_eq!(NetError::BodyNotReplayable.kind(), ErrorKind::InvalidRequest);
}

#[test]
fn test_load_state_transitions() {
    use LoadState::*;

    assert!(Created.can_transition_to(Resolving));
    assert!(Resolving.can_transition_to(Connecting));
    assert!(Connecting.can_transition_to(HeadersReceived));
    assert!(HeadersReceived.can_transition_to(Streaming));
    assert!(Streaming.can_transition_to(Completed));

    // Redirect loops back
    assert!(HeadersReceived.can_transition_to(Resolving));

    assert!(Connecting.can_transition_to(Cancelled));
    assert!(Streaming.can_transition_to(Failed));

    assert!(!Completed.can_transition_to(Failed));
    assert!(!Cancelled.can_transition_to(Resolving));
    assert!(!Created.can_transition_to(Streaming));
}
