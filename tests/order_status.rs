use storefront_api::error::AppError;
use storefront_api::models::OrderStatus;

#[test]
fn terminal_flags() {
    assert!(!OrderStatus::Placed.is_terminal());
    assert!(!OrderStatus::Processing.is_terminal());
    assert!(!OrderStatus::Shipped.is_terminal());
    assert!(OrderStatus::Delivered.is_terminal());
    assert!(OrderStatus::Cancelled.is_terminal());
}

#[test]
fn parse_round_trips() {
    for status in OrderStatus::ALL {
        assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
    }
    assert_eq!(OrderStatus::parse("refunded"), None);
    assert_eq!(OrderStatus::parse(""), None);
}

// Any move out of a non-terminal status is allowed, including jumps the
// linear progression diagram does not show.
#[test]
fn non_terminal_states_allow_every_transition() {
    for from in [
        OrderStatus::Placed,
        OrderStatus::Processing,
        OrderStatus::Shipped,
    ] {
        for to in OrderStatus::ALL {
            assert!(
                from.ensure_transition(to).is_ok(),
                "{from} -> {to} should be allowed"
            );
        }
    }
}

#[test]
fn placed_to_cancelled_is_allowed() {
    assert!(
        OrderStatus::Placed
            .ensure_transition(OrderStatus::Cancelled)
            .is_ok()
    );
}

#[test]
fn terminal_states_block_every_transition() {
    for from in [OrderStatus::Delivered, OrderStatus::Cancelled] {
        for to in OrderStatus::ALL {
            let err = from
                .ensure_transition(to)
                .expect_err("terminal state must not transition");
            match &err {
                AppError::TerminalState(state) => assert_eq!(state, from.as_str()),
                other => panic!("expected TerminalState, got {other:?}"),
            }
            assert_eq!(err.kind(), "terminal_state_violation");
        }
    }
}
