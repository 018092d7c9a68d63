use proptest::prelude::*;
use safe_ledger::*;

const ONE_ETHER: u128 = 1_000_000_000_000_000_000;
const PRICE: u128 = 1_000;

type TestLedger = Ledger<PriceBook, SyntheticToken, AssetBank>;

struct Fixture {
    ledger: TestLedger,
    addr1: Address,
    token: Address,
}

fn addr(label: &str) -> Address {
    Address::from_label(label.as_bytes())
}

fn deploy() -> Fixture {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();

    let config = LedgerConfig::default();
    let deployer = addr("owner");
    let addr1 = addr("addr1");
    let token = addr("mock-token");

    let mut sbd = SyntheticToken::new("SBD Token", "SBD", deployer);
    sbd.set_minter(deployer, config.address).unwrap();

    let mut mock = FungibleToken::new("Mock Token", "MKT");
    mock.mint(addr1, 1_000 * ONE_ETHER).unwrap();

    let mut bank = AssetBank::new();
    bank.credit_native(addr1, 10 * ONE_ETHER).unwrap();
    bank.register_token(token, mock).unwrap();

    let ledger = Ledger::new(config, PriceBook::fixed(PRICE), sbd, bank).unwrap();

    Fixture { ledger, addr1, token }
}

fn open_native(fx: &mut Fixture, amount: u128) -> SafeId {
    fx.ledger
        .open_safe(
            Call::new(fx.addr1).with_value(amount),
            CollateralType::Native,
            amount,
            100,
        )
        .unwrap()
}

fn assert_books_balance(ledger: &TestLedger) {
    let debt: u128 = ledger.safes().map(|safe| safe.borrowed_amount).sum();
    assert_eq!(ledger.total_debt(), debt);
    assert_eq!(ledger.issuer().total_supply(), debt);

    let native: u128 = ledger
        .safes()
        .filter(|safe| safe.collateral.is_native())
        .map(|safe| safe.deposited_amount)
        .sum();
    assert_eq!(ledger.custody(&CollateralType::Native), native);
    assert_eq!(
        ledger
            .assets()
            .balance_of(&CollateralType::Native, &ledger.address()),
        native
    );
}

#[test]
fn test_open_safe_with_native_collateral() {
    let mut fx = deploy();
    let safe_id = open_native(&mut fx, ONE_ETHER);

    assert_eq!(safe_id, SafeId::derive(&fx.addr1, &CollateralType::Native));

    let safe = fx.ledger.safe_by_id(&safe_id).unwrap();
    assert_eq!(safe.owner, fx.addr1);
    assert_eq!(safe.collateral.address(), Address::ZERO);
    assert_eq!(safe.deposited_amount, ONE_ETHER);
    assert_eq!(safe.borrowed_amount, 0);
    assert_eq!(safe.reserve_ratio, 100);
    assert_books_balance(&fx.ledger);
}

#[test]
fn test_open_safe_with_token_collateral() {
    let mut fx = deploy();
    let collateral = CollateralType::Token(fx.token);
    let ledger_address = fx.ledger.address();
    let amount = 100 * ONE_ETHER;

    fx.ledger
        .assets_mut()
        .token_mut(&fx.token)
        .unwrap()
        .approve(fx.addr1, ledger_address, amount);

    let safe_id = fx
        .ledger
        .open_safe(Call::new(fx.addr1), collateral, amount, 100)
        .unwrap();

    let safe = fx.ledger.safe_by_id(&safe_id).unwrap();
    assert_eq!(safe.collateral.address(), fx.token);
    assert_eq!(safe.deposited_amount, amount);
    assert_eq!(fx.ledger.custody(&collateral), amount);

    let mock = fx.ledger.assets().token(&fx.token).unwrap();
    assert_eq!(mock.balance_of(&ledger_address), amount);
    assert_eq!(mock.balance_of(&fx.addr1), 900 * ONE_ETHER);
    assert_eq!(mock.allowance(&fx.addr1, &ledger_address), 0);
}

#[test]
fn test_open_token_safe_without_approval_fails() {
    let mut fx = deploy();
    let collateral = CollateralType::Token(fx.token);

    let err = fx
        .ledger
        .open_safe(Call::new(fx.addr1), collateral, ONE_ETHER, 100)
        .unwrap_err();

    assert!(matches!(
        err,
        LedgerError::TransferFailed(AssetError::InsufficientAllowance { .. })
    ));
    assert!(fx.ledger.safe(&fx.addr1, &collateral).is_none());
    assert_eq!(fx.ledger.custody(&collateral), 0);
}

#[test]
fn test_open_token_safe_rejects_native_value() {
    let mut fx = deploy();
    let err = fx
        .ledger
        .open_safe(
            Call::new(fx.addr1).with_value(1),
            CollateralType::Token(fx.token),
            ONE_ETHER,
            100,
        )
        .unwrap_err();

    assert_eq!(err, LedgerError::InvalidDeposit { declared: 0, received: 1 });
}

#[test]
fn test_open_unregistered_token_fails() {
    let mut fx = deploy();
    let stranger = addr("stranger-token");

    let err = fx
        .ledger
        .open_safe(Call::new(fx.addr1), CollateralType::Token(stranger), 1, 100)
        .unwrap_err();

    assert_eq!(err, LedgerError::TransferFailed(AssetError::UnknownToken(stranger)));
}

#[test]
fn test_reopening_adds_to_deposit() {
    let mut fx = deploy();
    let safe_id = open_native(&mut fx, ONE_ETHER);
    fx.ledger
        .open_safe(
            Call::new(fx.addr1).with_value(ONE_ETHER),
            CollateralType::Native,
            ONE_ETHER,
            150,
        )
        .unwrap();

    let safe = fx.ledger.safe_by_id(&safe_id).unwrap();
    assert_eq!(safe.deposited_amount, 2 * ONE_ETHER);
    assert_eq!(safe.reserve_ratio, 150);
    assert_eq!(fx.ledger.safes().count(), 1);

    let events = fx.ledger.take_events();
    assert!(matches!(events[0], LedgerEvent::SafeOpened(_)));
    assert!(matches!(
        &events[1],
        LedgerEvent::CollateralAdded(added) if added.amount == ONE_ETHER && added.deposited_amount == 2 * ONE_ETHER
    ));
    assert_books_balance(&fx.ledger);
}

#[test]
fn test_borrow_up_to_the_limit() {
    let mut fx = deploy();
    open_native(&mut fx, ONE_ETHER);

    let max_borrow = ONE_ETHER * PRICE * 100 / 110;
    let borrow_amount = max_borrow - 1;

    fx.ledger
        .borrow(Call::new(fx.addr1), CollateralType::Native, borrow_amount)
        .unwrap();

    let safe = fx.ledger.safe(&fx.addr1, &CollateralType::Native).unwrap();
    assert_eq!(safe.borrowed_amount, borrow_amount);
    assert_eq!(fx.ledger.issuer().balance_of(&fx.addr1), borrow_amount);
    assert_eq!(
        fx.ledger
            .max_borrowable(&fx.addr1, &CollateralType::Native)
            .unwrap(),
        1
    );
    assert_books_balance(&fx.ledger);
}

#[test]
fn test_borrow_beyond_the_limit_fails() {
    let mut fx = deploy();
    open_native(&mut fx, ONE_ETHER);

    let max_borrow = ONE_ETHER * PRICE * 100 / 110;
    let err = fx
        .ledger
        .borrow(Call::new(fx.addr1), CollateralType::Native, max_borrow + 1)
        .unwrap_err();

    assert_eq!(
        err,
        LedgerError::InsufficientCollateral {
            requested: max_borrow + 1,
            available: max_borrow,
        }
    );
    assert_eq!(fx.ledger.issuer().total_supply(), 0);
}

#[test]
fn test_limit_follows_the_price() {
    let mut fx = deploy();
    open_native(&mut fx, 1);

    fx.ledger
        .borrow(Call::new(fx.addr1), CollateralType::Native, 500)
        .unwrap();

    // price halves: 1 × 500 × 100 / 110 = 454 < 500 already owed
    fx.ledger
        .price_source_mut()
        .set_price(CollateralType::Native, 500);

    let err = fx
        .ledger
        .borrow(Call::new(fx.addr1), CollateralType::Native, 1)
        .unwrap_err();
    assert_eq!(
        err,
        LedgerError::InsufficientCollateral {
            requested: 1,
            available: 0,
        }
    );
    assert_eq!(
        fx.ledger
            .collateral_ratio(&fx.addr1, &CollateralType::Native)
            .unwrap(),
        Some(100)
    );
}

#[test]
fn test_borrow_without_safe_fails() {
    let mut fx = deploy();
    let err = fx
        .ledger
        .borrow(Call::new(fx.addr1), CollateralType::Native, 1)
        .unwrap_err();

    assert_eq!(
        err,
        LedgerError::UnknownPosition(SafeId::derive(&fx.addr1, &CollateralType::Native))
    );
}

#[test]
fn test_repay_part_of_the_debt() {
    let mut fx = deploy();
    open_native(&mut fx, ONE_ETHER);

    let borrow_amount = 100 * ONE_ETHER;
    let repay_amount = 50 * ONE_ETHER;
    let ledger_address = fx.ledger.address();

    fx.ledger
        .borrow(Call::new(fx.addr1), CollateralType::Native, borrow_amount)
        .unwrap();
    fx.ledger
        .issuer_mut()
        .approve(fx.addr1, ledger_address, repay_amount);
    fx.ledger
        .repay(Call::new(fx.addr1), CollateralType::Native, repay_amount)
        .unwrap();

    let safe = fx.ledger.safe(&fx.addr1, &CollateralType::Native).unwrap();
    assert_eq!(safe.borrowed_amount, borrow_amount - repay_amount);
    assert_eq!(
        fx.ledger.issuer().balance_of(&fx.addr1),
        borrow_amount - repay_amount
    );
    assert_books_balance(&fx.ledger);
}

#[test]
fn test_repay_without_approval_keeps_debt() {
    let mut fx = deploy();
    open_native(&mut fx, ONE_ETHER);
    fx.ledger
        .borrow(Call::new(fx.addr1), CollateralType::Native, 100)
        .unwrap();

    let err = fx
        .ledger
        .repay(Call::new(fx.addr1), CollateralType::Native, 50)
        .unwrap_err();

    assert!(matches!(
        err,
        LedgerError::TransferFailed(AssetError::InsufficientAllowance { .. })
    ));
    assert_eq!(
        fx.ledger
            .safe(&fx.addr1, &CollateralType::Native)
            .unwrap()
            .borrowed_amount,
        100
    );
    assert_books_balance(&fx.ledger);
}

#[test]
fn test_repay_more_than_owed_fails() {
    let mut fx = deploy();
    open_native(&mut fx, ONE_ETHER);
    fx.ledger
        .borrow(Call::new(fx.addr1), CollateralType::Native, 100)
        .unwrap();

    let err = fx
        .ledger
        .repay(Call::new(fx.addr1), CollateralType::Native, 101)
        .unwrap_err();

    assert_eq!(
        err,
        LedgerError::RepayExceedsDebt {
            requested: 101,
            outstanding: 100,
        }
    );
}

#[test]
fn test_repay_after_tokens_moved_away_fails() {
    let mut fx = deploy();
    open_native(&mut fx, ONE_ETHER);
    let ledger_address = fx.ledger.address();
    let friend = addr("friend");

    fx.ledger
        .borrow(Call::new(fx.addr1), CollateralType::Native, 100)
        .unwrap();
    fx.ledger.issuer_mut().transfer(fx.addr1, friend, 60).unwrap();
    fx.ledger.issuer_mut().approve(fx.addr1, ledger_address, 100);

    let err = fx
        .ledger
        .repay(Call::new(fx.addr1), CollateralType::Native, 100)
        .unwrap_err();

    assert!(matches!(
        err,
        LedgerError::TransferFailed(AssetError::InsufficientBalance { available: 40, .. })
    ));
    assert_eq!(fx.ledger.total_debt(), 100);
}

#[test]
fn test_close_safe_returns_collateral() {
    let mut fx = deploy();
    let safe_id = open_native(&mut fx, ONE_ETHER);

    let returned = fx
        .ledger
        .close_safe(Call::new(fx.addr1), CollateralType::Native)
        .unwrap();

    assert_eq!(returned, ONE_ETHER);
    assert!(fx.ledger.safe_by_id(&safe_id).is_none());
    assert_eq!(fx.ledger.assets().native_balance(&fx.addr1), 10 * ONE_ETHER);
    assert_eq!(fx.ledger.custody(&CollateralType::Native), 0);
    assert_books_balance(&fx.ledger);

    let err = fx
        .ledger
        .close_safe(Call::new(fx.addr1), CollateralType::Native)
        .unwrap_err();
    assert_eq!(err, LedgerError::UnknownPosition(safe_id));
}

#[test]
fn test_close_token_safe_returns_tokens() {
    let mut fx = deploy();
    let collateral = CollateralType::Token(fx.token);
    let ledger_address = fx.ledger.address();

    fx.ledger
        .assets_mut()
        .token_mut(&fx.token)
        .unwrap()
        .approve(fx.addr1, ledger_address, ONE_ETHER);
    fx.ledger
        .open_safe(Call::new(fx.addr1), collateral, ONE_ETHER, 100)
        .unwrap();
    fx.ledger.close_safe(Call::new(fx.addr1), collateral).unwrap();

    let mock = fx.ledger.assets().token(&fx.token).unwrap();
    assert_eq!(mock.balance_of(&fx.addr1), 1_000 * ONE_ETHER);
    assert_eq!(mock.balance_of(&ledger_address), 0);
}

#[test]
fn test_close_with_debt_fails() {
    let mut fx = deploy();
    open_native(&mut fx, ONE_ETHER);
    fx.ledger
        .borrow(Call::new(fx.addr1), CollateralType::Native, 10)
        .unwrap();

    let err = fx
        .ledger
        .close_safe(Call::new(fx.addr1), CollateralType::Native)
        .unwrap_err();

    assert_eq!(err, LedgerError::DebtOutstanding(10));
    assert!(fx.ledger.safe(&fx.addr1, &CollateralType::Native).is_some());
}

#[test]
fn test_full_lifecycle_emits_events_in_order() {
    let mut fx = deploy();
    let safe_id = open_native(&mut fx, ONE_ETHER);
    let ledger_address = fx.ledger.address();

    fx.ledger
        .borrow(Call::new(fx.addr1), CollateralType::Native, 300)
        .unwrap();
    fx.ledger.issuer_mut().approve(fx.addr1, ledger_address, 300);
    fx.ledger
        .repay(Call::new(fx.addr1), CollateralType::Native, 300)
        .unwrap();
    fx.ledger
        .close_safe(Call::new(fx.addr1), CollateralType::Native)
        .unwrap();

    let events = fx.ledger.take_events();
    assert_eq!(events.len(), 4);
    assert!(events.iter().all(|event| event.safe_id() == safe_id));
    assert!(matches!(events[0], LedgerEvent::SafeOpened(_)));
    assert!(matches!(&events[1], LedgerEvent::Borrowed(b) if b.price == PRICE));
    assert!(matches!(&events[2], LedgerEvent::Repaid(r) if r.borrowed_amount == 0));
    assert!(matches!(&events[3], LedgerEvent::SafeClosed(c) if c.returned_amount == ONE_ETHER));

    let json = serde_json::to_value(&events[1]).unwrap();
    assert_eq!(json["type"], "borrowed");
    assert_eq!(json["owner"], fx.addr1.to_string());
}

#[test]
fn test_safes_are_isolated_per_owner_and_collateral() {
    let mut fx = deploy();
    let addr2 = addr("addr2");
    fx.ledger.assets_mut().credit_native(addr2, ONE_ETHER).unwrap();

    open_native(&mut fx, ONE_ETHER);
    fx.ledger
        .open_safe(
            Call::new(addr2).with_value(ONE_ETHER),
            CollateralType::Native,
            ONE_ETHER,
            120,
        )
        .unwrap();
    fx.ledger
        .borrow(Call::new(addr2), CollateralType::Native, 42)
        .unwrap();

    assert_eq!(fx.ledger.safes_of(fx.addr1).count(), 1);
    assert_eq!(
        fx.ledger
            .safe(&fx.addr1, &CollateralType::Native)
            .unwrap()
            .borrowed_amount,
        0
    );
    assert_eq!(fx.ledger.custody(&CollateralType::Native), 2 * ONE_ETHER);
    assert_books_balance(&fx.ledger);
}

#[test]
fn test_zero_address_token_cannot_reach_the_native_safe() {
    let mut fx = deploy();
    let victim = addr("victim");
    fx.ledger.assets_mut().credit_native(victim, 100).unwrap();
    fx.ledger
        .open_safe(Call::new(victim).with_value(100), CollateralType::Native, 100, 100)
        .unwrap();
    open_native(&mut fx, 1);

    assert_eq!(
        fx.ledger
            .assets_mut()
            .register_token(Address::ZERO, FungibleToken::new("Fake", "FAKE")),
        Err(AssetError::ZeroAddressToken)
    );

    let fake = CollateralType::Token(Address::ZERO);
    let rejected = LedgerError::InvalidCollateral(fake);
    assert_eq!(
        fx.ledger.open_safe(Call::new(fx.addr1), fake, 99, 100).unwrap_err(),
        rejected
    );
    assert_eq!(fx.ledger.borrow(Call::new(fx.addr1), fake, 1).unwrap_err(), rejected);
    assert_eq!(fx.ledger.repay(Call::new(fx.addr1), fake, 1).unwrap_err(), rejected);
    assert_eq!(fx.ledger.close_safe(Call::new(fx.addr1), fake).unwrap_err(), rejected);

    // the native safe still holds only what was deposited natively
    assert_eq!(
        fx.ledger
            .safe(&fx.addr1, &CollateralType::Native)
            .unwrap()
            .deposited_amount,
        1
    );
    assert_eq!(
        fx.ledger
            .close_safe(Call::new(fx.addr1), CollateralType::Native)
            .unwrap(),
        1
    );
    assert_eq!(fx.ledger.custody(&CollateralType::Native), 100);
    assert_books_balance(&fx.ledger);
}

#[test]
fn test_additive_open_overflow_leaves_safe_unchanged() {
    let mut fx = deploy();
    let half = 1u128 << 127;
    fx.ledger.assets_mut().credit_native(fx.addr1, half).unwrap();
    let safe_id = open_native(&mut fx, half);
    fx.ledger.take_events();

    let err = fx
        .ledger
        .open_safe(
            Call::new(fx.addr1).with_value(half),
            CollateralType::Native,
            half,
            100,
        )
        .unwrap_err();

    assert_eq!(err, LedgerError::ArithmeticOverflow);
    assert_eq!(fx.ledger.safe_by_id(&safe_id).unwrap().deposited_amount, half);
    assert_eq!(fx.ledger.custody(&CollateralType::Native), half);
    assert!(fx.ledger.events().is_empty());
    assert_books_balance(&fx.ledger);
}

#[test]
fn test_custody_overflow_rejects_new_safe() {
    let mut fx = deploy();
    let half = 1u128 << 127;
    let whale = addr("whale");
    fx.ledger.assets_mut().credit_native(fx.addr1, half).unwrap();
    fx.ledger.assets_mut().credit_native(whale, half).unwrap();
    open_native(&mut fx, half);

    let err = fx
        .ledger
        .open_safe(
            Call::new(whale).with_value(half),
            CollateralType::Native,
            half,
            100,
        )
        .unwrap_err();

    assert_eq!(err, LedgerError::ArithmeticOverflow);
    assert!(fx.ledger.safe(&whale, &CollateralType::Native).is_none());
    assert_eq!(fx.ledger.custody(&CollateralType::Native), half);
    assert_eq!(fx.ledger.assets().native_balance(&whale), half);
    assert_books_balance(&fx.ledger);
}

#[test]
fn test_borrow_with_overflowing_collateral_value_fails() {
    let mut fx = deploy();
    // 1e36 × 1000 × 100 does not fit in u128
    let deposit = 1_000_000_000_000_000_000 * ONE_ETHER;
    fx.ledger.assets_mut().credit_native(fx.addr1, deposit).unwrap();
    let safe_id = open_native(&mut fx, deposit);

    let err = fx
        .ledger
        .borrow(Call::new(fx.addr1), CollateralType::Native, 1)
        .unwrap_err();

    assert_eq!(err, LedgerError::ArithmeticOverflow);
    let safe = fx.ledger.safe_by_id(&safe_id).unwrap();
    assert_eq!(safe.borrowed_amount, 0);
    assert_eq!(safe.deposited_amount, deposit);
    assert_eq!(fx.ledger.issuer().total_supply(), 0);
    assert_books_balance(&fx.ledger);
}

#[test]
fn test_rejects_invalid_config() {
    let result = Ledger::new(
        LedgerConfig {
            liquidation_ratio: 50,
            ..LedgerConfig::default()
        },
        PriceBook::placeholder(),
        SyntheticToken::new("SBD Token", "SBD", addr("owner")),
        AssetBank::new(),
    );

    assert!(matches!(result, Err(LedgerError::InvalidConfig(_))));
}

#[derive(Debug, Clone)]
enum Op {
    Open(u128),
    Borrow(u128),
    Repay(u128),
    Close,
    Reprice(u128),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1u128..1_000).prop_map(Op::Open),
        (1u128..2_000_000).prop_map(Op::Borrow),
        (1u128..2_000_000).prop_map(Op::Repay),
        Just(Op::Close),
        (1u128..5_000).prop_map(Op::Reprice),
    ]
}

proptest! {
    #[test]
    fn prop_books_balance_and_debt_stays_covered(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let mut fx = deploy();
        let ledger_address = fx.ledger.address();
        fx.ledger.issuer_mut().approve(fx.addr1, ledger_address, u128::MAX);

        let mut price = PRICE;
        for op in ops {
            let call = Call::new(fx.addr1);
            let before = fx.ledger.safe(&fx.addr1, &CollateralType::Native).cloned();

            let result = match op {
                Op::Open(amount) => fx
                    .ledger
                    .open_safe(call.with_value(amount), CollateralType::Native, amount, 100)
                    .map(|_| ()),
                Op::Borrow(amount) => fx.ledger.borrow(call, CollateralType::Native, amount),
                Op::Repay(amount) => fx.ledger.repay(call, CollateralType::Native, amount),
                Op::Close => fx.ledger.close_safe(call, CollateralType::Native).map(|_| ()),
                Op::Reprice(p) => {
                    price = p;
                    fx.ledger.price_source_mut().set_price(CollateralType::Native, p);
                    Ok(())
                }
            };

            if result.is_err() {
                prop_assert_eq!(fx.ledger.safe(&fx.addr1, &CollateralType::Native), before.as_ref());
            }

            if let Some(safe) = fx.ledger.safe(&fx.addr1, &CollateralType::Native) {
                if result.is_ok() && safe.borrowed_amount > before.as_ref().map_or(0, |s| s.borrowed_amount) {
                    prop_assert!(safe.deposited_amount * price * 100 >= safe.borrowed_amount * 110);
                }
            }

            assert_books_balance(&fx.ledger);
        }
    }
}
