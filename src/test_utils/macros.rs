/// Advances an [`EventIterator`](crate::EventIterator) and asserts it yields `expected`.
///
/// Compares the decoded event (not the raw log). Fails if `next` doesn't return within the
/// timeout (5 seconds by default).
#[macro_export]
macro_rules! assert_next_event {
    ($iter: expr, $expected: expr) => {
        $crate::assert_next_event!($iter, $expected, timeout = 5)
    };
    ($iter: expr, $expected: expr, timeout = $secs: expr) => {
        let advanced =
            tokio::time::timeout(std::time::Duration::from_secs($secs), $iter.next())
                .await
                .expect("timed out");
        let expected = $expected;
        assert!(
            advanced,
            "Expected {:?}, but the iterator ended with error {:?}",
            expected,
            $iter.error()
        );
        let event = &$iter.event().expect("advanced iterator has an event").event;
        assert_eq!(event, &expected, "Expected {:?}, got {:?}", expected, event);
    };
}

/// Asserts that an [`EventIterator`](crate::EventIterator) ends cleanly: `next` returns `false`
/// and no error is recorded.
#[macro_export]
macro_rules! assert_exhausted {
    ($iter: expr) => {
        $crate::assert_exhausted!($iter, timeout = 5)
    };
    ($iter: expr, timeout = $secs: expr) => {
        let advanced =
            tokio::time::timeout(std::time::Duration::from_secs($secs), $iter.next())
                .await
                .expect("timed out");
        assert!(!advanced, "Expected the iterator to end, got {:?}", $iter.event());
        assert_eq!($iter.error(), None, "Expected a clean end");
    };
}

/// Receives from a subscription sink and asserts the decoded event equals `expected`.
#[macro_export]
macro_rules! assert_received {
    ($sink: expr, $expected: expr) => {
        $crate::assert_received!($sink, $expected, timeout = 5)
    };
    ($sink: expr, $expected: expr, timeout = $secs: expr) => {
        let message = tokio::time::timeout(
            std::time::Duration::from_secs($secs),
            tokio_stream::StreamExt::next(&mut $sink),
        )
        .await
        .expect("timed out");
        let expected = $expected;
        match message {
            std::option::Option::Some(decoded) => {
                assert_eq!(
                    decoded.event, expected,
                    "Expected {:?}, got {:?}", expected, decoded.event
                );
            }
            std::option::Option::None => {
                panic!("Expected {:?}, but the sink was closed", expected);
            }
        }
    };
}

/// Asserts that a subscription sink is closed: every sender, including the forwarding task's,
/// is gone and nothing is pending.
#[macro_export]
macro_rules! assert_closed {
    ($sink: expr) => {
        $crate::assert_closed!($sink, timeout = 5)
    };
    ($sink: expr, timeout = $secs: expr) => {
        let message = tokio::time::timeout(
            std::time::Duration::from_secs($secs),
            tokio_stream::StreamExt::next(&mut $sink),
        )
        .await
        .expect("timed out");
        assert!(message.is_none(), "Expected a closed sink, got {:?}", message)
    };
}
