//! Token-service step definitions
//!
//! The operator account pays for setup transactions and is the treasury and
//! supply key of every token a scenario creates. Participants are addressed
//! by ordinal.

use log::info;

use super::registry::{StepArgs, StepFuture, StepRegistry};
use super::state::{FeeSnapshot, PendingTransfer};
use super::world::{Mutation, ScenarioWorld};
use crate::accounts::{AccountId, Ordinal, TestAccount};
use crate::assertions::{assert_at_least, assert_equal, assert_greater, assert_true};
use crate::error::StepError;
use crate::ledger::{Hbar, LedgerError, Status, TokenId, TokenInfo, TokenSpec, TokenTransfer};

/// Name of the token created implicitly by account setup steps
pub const DEFAULT_TOKEN_NAME: &str = "Test Token";

const ORDINAL: &str = "(first|second|third|fourth)";

/// Registry with every token-service step
pub fn token_service_steps() -> Result<StepRegistry, regex::Error> {
    let mut registry = StepRegistry::new();

    registry
        .given(r"A Hedera account with more than (\d+) hbar", given_operator_hbar)?
        .given(r"A first [Hh]edera account with more than (\d+) hbar", given_first_hbar)?
        .given(r"A second [Hh]edera account", given_second_account)?
        .given(r"A token named (.+) \((\w+)\) with (\d+) tokens", given_fixed_token)?
        .given(
            &format!(r"The {} account holds (\d+) (\w+) tokens", ORDINAL),
            given_holdings,
        )?
        .given(
            &format!(
                r"A {} [Hh]edera account with (more than )?(\d+) hbar and (\d+) (\w+) tokens",
                ORDINAL
            ),
            given_funded_account,
        )?;

    registry
        .when(r"I create a token named (.+) \((\w+)\)", create_mintable_token)?
        .when(
            r"I create a fixed supply token named (.+) \((\w+)\) with (\d+) tokens",
            create_fixed_token,
        )?
        .when(
            &format!(
                r"The {} account creates a transaction to transfer (\d+) (\w+) tokens to the {} account",
                ORDINAL, ORDINAL
            ),
            create_transfer,
        )?
        .when(
            r"A transaction is created to transfer (\d+) (\w+) tokens out of the first and second account and (\d+) (\w+) tokens into the third account and (\d+) (\w+) tokens into the fourth account",
            create_multi_party_transfer,
        )?
        .when(
            &format!(r"The {} account has signed the transaction", ORDINAL),
            sign_transfer,
        )?
        .when(
            &format!(r"The {} account submits the transaction", ORDINAL),
            submit_transfer,
        )?
        .when(
            &format!(r"The {} account attempts to submit the transaction", ORDINAL),
            attempt_transfer,
        )?;

    registry
        .then(r#"The token has the name "([^"]*)""#, then_token_name)?
        .then(r#"The token has the symbol "([^"]*)""#, then_token_symbol)?
        .then(r"The token has (\d+) decimals", then_token_decimals)?
        .then(r"The token is owned by the account", then_token_owner)?
        .then(r"The total supply of the token is (\d+)", then_total_supply)?
        .then(r"An attempt to mint (\d+) additional tokens succeeds", then_mint_succeeds)?
        .then(r"An attempt to mint tokens fails", then_mint_fails)?
        .then(
            &format!(r"The {} account holds (\d+) (\w+) tokens", ORDINAL),
            then_holdings,
        )?
        .then(
            &format!(r"The {} account has paid for the transaction fee", ORDINAL),
            then_paid_fee,
        )?
        .then(r"The transaction succeeds", then_transaction_succeeds)?
        .then(r"The transaction fails with (\w+)", then_transaction_fails)?;

    Ok(registry)
}

// Shared helpers

enum Supply {
    Infinite,
    /// Initial supply equals the cap
    Fixed(u64),
}

async fn refresh_token_info(world: &mut ScenarioWorld) -> Result<TokenInfo, StepError> {
    let token = world.state.token()?;
    let info = world.ledger().get_token_info(&token).await?;
    world.state.token_info = Some(info.clone());
    Ok(info)
}

async fn create_token(
    world: &mut ScenarioWorld,
    name: &str,
    symbol: &str,
    supply: Supply,
) -> Result<TokenId, StepError> {
    if world.state.has_token() {
        return Err(StepError::state("scenario already created its token"));
    }

    let operator = world.operator();
    let defaults = world.token_defaults();
    let builder = TokenSpec::builder(name, symbol, operator.id)
        .decimals(defaults.decimals)
        .supply_key(operator.key.fingerprint());
    let builder = match supply {
        Supply::Infinite => builder.initial_supply(defaults.initial_supply).infinite(),
        Supply::Fixed(amount) => builder.initial_supply(amount).finite(amount),
    };
    let spec = builder.build().map_err(LedgerError::InvalidSpec)?;

    let receipt = world
        .execute(&operator, &[], Mutation::CreateToken(spec))
        .await?;
    let token = receipt
        .token_id
        .ok_or_else(|| StepError::state("token creation receipt carries no token id"))?;
    world.state.set_token(token)?;
    refresh_token_info(world).await?;

    info!("[{}] created token {} ({})", world.scenario_name(), token, symbol);
    Ok(token)
}

/// The step must name the scenario token's symbol
fn check_symbol(world: &ScenarioWorld, symbol: &str) -> Result<TokenId, StepError> {
    let token = world.state.token()?;
    let info = world.state.token_info()?;
    if info.symbol != symbol {
        return Err(StepError::argument(format!(
            "step refers to {} but the scenario token is {} ({})",
            symbol, info.symbol, token
        )));
    }
    Ok(token)
}

async fn token_balance(
    world: &mut ScenarioWorld,
    account: &AccountId,
    token: &TokenId,
) -> Result<u64, StepError> {
    let balance = world.ledger().query_balance(account).await?;
    let amount = balance.token(token);
    world.state.last_balance = Some(balance);
    Ok(amount)
}

async fn hbar_balance(world: &mut ScenarioWorld, account: &AccountId) -> Result<Hbar, StepError> {
    let balance = world.ledger().query_balance(account).await?;
    let hbars = balance.hbars;
    world.state.last_balance = Some(balance);
    Ok(hbars)
}

async fn ensure_associated(
    world: &mut ScenarioWorld,
    account: &TestAccount,
    token: TokenId,
) -> Result<(), StepError> {
    let balance = world.ledger().query_balance(&account.id).await?;
    if balance.is_associated(&token) {
        return Ok(());
    }

    let operator = world.operator();
    world
        .execute(
            &operator,
            &[account.key.clone()],
            Mutation::Associate {
                account: account.id,
                tokens: vec![token],
            },
        )
        .await?;
    Ok(())
}

/// Move tokens between the treasury and `account` until it holds `amount`
async fn set_holdings(
    world: &mut ScenarioWorld,
    ordinal: Ordinal,
    amount: u64,
    symbol: &str,
) -> Result<(), StepError> {
    let token = check_symbol(world, symbol)?;
    let account = world.participant(ordinal)?;
    let treasury = world.state.token_info()?.treasury;

    if account.id == treasury {
        let current = token_balance(world, &account.id, &token).await?;
        if current != amount {
            return Err(StepError::state(format!(
                "the {} account is the treasury of {} and holds {}, it cannot be set to {}",
                ordinal, token, current, amount
            )));
        }
        return Ok(());
    }

    ensure_associated(world, &account, token).await?;
    let current = token_balance(world, &account.id, &token).await?;
    let operator = world.operator();

    if current < amount {
        let delta = amount - current;
        world
            .execute(
                &operator,
                &[],
                Mutation::Transfer {
                    token,
                    transfers: vec![
                        TokenTransfer::debit(treasury, delta)?,
                        TokenTransfer::credit(account.id, delta)?,
                    ],
                },
            )
            .await?;
    } else if current > amount {
        let delta = current - amount;
        world
            .execute(
                &operator,
                &[account.key.clone()],
                Mutation::Transfer {
                    token,
                    transfers: vec![
                        TokenTransfer::debit(account.id, delta)?,
                        TokenTransfer::credit(treasury, delta)?,
                    ],
                },
            )
            .await?;
    }

    let held = token_balance(world, &account.id, &token).await?;
    assert_equal(held, amount, world.ctx("token balance after setup"))?;
    Ok(())
}

async fn submit_pending(
    world: &mut ScenarioWorld,
    ordinal: Ordinal,
) -> Result<Result<(), LedgerError>, StepError> {
    let pending: PendingTransfer = world.state.take_pending_transfer()?;
    let payer = world.participant(ordinal)?;

    let hbars_before = hbar_balance(world, &payer.id).await?;
    world.state.fee_snapshot = Some(FeeSnapshot {
        payer: payer.id,
        hbars_before,
    });

    let result = world
        .execute(
            &payer,
            &pending.signatures,
            Mutation::Transfer {
                token: pending.token,
                transfers: pending.transfers,
            },
        )
        .await;
    Ok(result.map(|_| ()))
}

// Given

fn given_operator_hbar(world: &mut ScenarioWorld, args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let threshold = Hbar::from_hbars(args.u64(0)?);
        let operator = world.operator();
        let hbars = hbar_balance(world, &operator.id).await?;
        assert_greater(hbars, threshold, world.ctx("operator hbar balance"))?;
        Ok(())
    })
}

fn given_first_hbar(world: &mut ScenarioWorld, args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let threshold = Hbar::from_hbars(args.u64(0)?);
        let first = world.participant(Ordinal::First)?;
        let hbars = hbar_balance(world, &first.id).await?;
        assert_greater(hbars, threshold, world.ctx("first account hbar balance"))?;
        Ok(())
    })
}

fn given_second_account(world: &mut ScenarioWorld, _args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let first = world.participant(Ordinal::First)?;
        let second = world.participant(Ordinal::Second)?;
        assert_true(first.id != second.id, world.ctx("second account is distinct"))?;

        // Must exist on the ledger
        hbar_balance(world, &second.id).await?;
        Ok(())
    })
}

fn given_fixed_token(world: &mut ScenarioWorld, args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let supply = args.u64(2)?;
        create_token(world, args.str(0)?, args.str(1)?, Supply::Fixed(supply)).await?;
        Ok(())
    })
}

fn given_holdings(world: &mut ScenarioWorld, args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        set_holdings(world, args.ordinal(0)?, args.u64(1)?, args.str(2)?).await
    })
}

fn given_funded_account(world: &mut ScenarioWorld, args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let ordinal = args.ordinal(0)?;
        let strict = args.opt(1).is_some();
        let threshold = Hbar::from_hbars(args.u64(2)?);
        let amount = args.u64(3)?;
        let symbol = args.str(4)?;

        let account = world.participant(ordinal)?;
        let hbars = hbar_balance(world, &account.id).await?;
        let ctx = world.ctx("hbar balance");
        if strict {
            assert_greater(hbars, threshold, ctx)?;
        } else {
            assert_at_least(hbars, threshold, ctx)?;
        }

        if !world.state.has_token() {
            create_token(world, DEFAULT_TOKEN_NAME, symbol, Supply::Infinite).await?;
        }
        set_holdings(world, ordinal, amount, symbol).await
    })
}

// When

fn create_mintable_token(world: &mut ScenarioWorld, args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        create_token(world, args.str(0)?, args.str(1)?, Supply::Infinite).await?;
        Ok(())
    })
}

fn create_fixed_token(world: &mut ScenarioWorld, args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let supply = args.u64(2)?;
        create_token(world, args.str(0)?, args.str(1)?, Supply::Fixed(supply)).await?;
        Ok(())
    })
}

fn create_transfer(world: &mut ScenarioWorld, args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let from = args.ordinal(0)?;
        let amount = args.u64(1)?;
        let token = check_symbol(world, args.str(2)?)?;
        let to = args.ordinal(3)?;
        if from == to {
            return Err(StepError::argument(format!(
                "the {} account cannot transfer to itself",
                from
            )));
        }

        let sender = world.participant(from)?;
        let recipient = world.participant(to)?;
        world.state.pending_transfer = Some(PendingTransfer::new(
            token,
            vec![
                TokenTransfer::debit(sender.id, amount)?,
                TokenTransfer::credit(recipient.id, amount)?,
            ],
        ));
        Ok(())
    })
}

fn create_multi_party_transfer(world: &mut ScenarioWorld, args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let out_each = args.u64(0)?;
        let into_third = args.u64(2)?;
        let into_fourth = args.u64(4)?;
        let token = check_symbol(world, args.str(1)?)?;
        for index in [3, 5] {
            check_symbol(world, args.str(index)?)?;
        }

        let debited = out_each as u128 * 2;
        let credited = into_third as u128 + into_fourth as u128;
        if debited != credited {
            return Err(StepError::argument(format!(
                "transfer does not balance: {} out, {} in",
                debited, credited
            )));
        }

        let transfers = vec![
            TokenTransfer::debit(world.participant(Ordinal::First)?.id, out_each)?,
            TokenTransfer::debit(world.participant(Ordinal::Second)?.id, out_each)?,
            TokenTransfer::credit(world.participant(Ordinal::Third)?.id, into_third)?,
            TokenTransfer::credit(world.participant(Ordinal::Fourth)?.id, into_fourth)?,
        ];
        world.state.pending_transfer = Some(PendingTransfer::new(token, transfers));
        Ok(())
    })
}

fn sign_transfer(world: &mut ScenarioWorld, args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let signer = world.participant(args.ordinal(0)?)?;
        world.state.pending_transfer_mut()?.sign(&signer.key);
        Ok(())
    })
}

fn submit_transfer(world: &mut ScenarioWorld, args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        submit_pending(world, args.ordinal(0)?).await??;
        Ok(())
    })
}

fn attempt_transfer(world: &mut ScenarioWorld, args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        if let Err(e) = submit_pending(world, args.ordinal(0)?).await? {
            info!("[{}] transfer attempt failed: {}", world.scenario_name(), e);
        }
        Ok(())
    })
}

// Then

fn then_token_name(world: &mut ScenarioWorld, args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let info = refresh_token_info(world).await?;
        assert_equal(info.name.as_str(), args.str(0)?, world.ctx("token name"))?;
        Ok(())
    })
}

fn then_token_symbol(world: &mut ScenarioWorld, args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let info = refresh_token_info(world).await?;
        assert_equal(info.symbol.as_str(), args.str(0)?, world.ctx("token symbol"))?;
        Ok(())
    })
}

fn then_token_decimals(world: &mut ScenarioWorld, args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let expected: u32 = args.parse(0)?;
        let info = refresh_token_info(world).await?;
        assert_equal(info.decimals, expected, world.ctx("token decimals"))?;
        Ok(())
    })
}

fn then_token_owner(world: &mut ScenarioWorld, _args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let info = refresh_token_info(world).await?;
        let operator = world.operator();
        assert_equal(info.treasury, operator.id, world.ctx("token treasury"))?;
        Ok(())
    })
}

fn then_total_supply(world: &mut ScenarioWorld, args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let expected = args.u64(0)?;
        let info = refresh_token_info(world).await?;
        assert_equal(info.total_supply, expected, world.ctx("total supply"))?;
        Ok(())
    })
}

fn then_mint_succeeds(world: &mut ScenarioWorld, args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let amount = args.u64(0)?;
        let token = world.state.token()?;
        let before = refresh_token_info(world).await?.total_supply;

        let operator = world.operator();
        let receipt = world
            .execute(&operator, &[], Mutation::Mint { token, amount })
            .await?;

        let after = refresh_token_info(world).await?.total_supply;
        let expected = before.saturating_add(amount);
        assert_equal(after, expected, world.ctx("total supply after mint"))?;
        if let Some(reported) = receipt.total_supply {
            assert_equal(reported, expected, world.ctx("receipt total supply"))?;
        }
        Ok(())
    })
}

fn then_mint_fails(world: &mut ScenarioWorld, _args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let token = world.state.token()?;
        let before = refresh_token_info(world).await?.total_supply;

        let operator = world.operator();
        let result = world
            .execute(&operator, &[], Mutation::Mint { token, amount: 1 })
            .await;
        match result {
            Ok(_) => assert_true(false, world.ctx("mint rejected"))?,
            Err(e) if e.status().is_some() => {
                info!("[{}] mint rejected with {}", world.scenario_name(), e);
            }
            Err(e) => return Err(e.into()),
        }

        let after = refresh_token_info(world).await?.total_supply;
        assert_equal(after, before, world.ctx("total supply after rejected mint"))?;
        Ok(())
    })
}

fn then_holdings(world: &mut ScenarioWorld, args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let ordinal = args.ordinal(0)?;
        let expected = args.u64(1)?;
        let token = check_symbol(world, args.str(2)?)?;
        let account = world.participant(ordinal)?;

        let held = token_balance(world, &account.id, &token).await?;
        let subject = format!("{} account {} balance", ordinal, args.str(2)?);
        assert_equal(held, expected, world.ctx(&subject))?;
        Ok(())
    })
}

fn then_paid_fee(world: &mut ScenarioWorld, args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let account = world.participant(args.ordinal(0)?)?;
        let snapshot = world
            .state
            .fee_snapshot
            .ok_or_else(|| StepError::state("no transaction has been submitted"))?;
        assert_equal(snapshot.payer, account.id, world.ctx("transaction payer"))?;

        let hbars_after = hbar_balance(world, &account.id).await?;
        let paid = snapshot
            .hbars_before
            .checked_sub(hbars_after)
            .unwrap_or(Hbar::ZERO);
        assert_greater(paid, Hbar::ZERO, world.ctx("transaction fee paid"))?;
        Ok(())
    })
}

fn then_transaction_succeeds(world: &mut ScenarioWorld, _args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let actual = match world.state.last_result()? {
            Ok(receipt) => receipt.status.to_string(),
            Err(e) => e.to_string(),
        };
        assert_equal(
            actual.as_str(),
            Status::Success.to_string().as_str(),
            world.ctx("transaction status"),
        )?;
        Ok(())
    })
}

fn then_transaction_fails(world: &mut ScenarioWorld, args: StepArgs) -> StepFuture<'_> {
    Box::pin(async move {
        let expected: Status = args.parse(0)?;
        let actual = match world.state.last_result()? {
            Ok(receipt) => receipt.status.to_string(),
            Err(e) => match e.status() {
                Some(status) => status.to_string(),
                None => e.to_string(),
            },
        };
        assert_equal(
            actual.as_str(),
            expected.to_string().as_str(),
            world.ctx("transaction status"),
        )?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenarios::registry::{StepKind, StepMatch};

    fn lookup(kind: StepKind, text: &str) -> Vec<Option<String>> {
        let registry = token_service_steps().unwrap();
        match registry.find(kind, text) {
            StepMatch::Found(_, args) => (0..args.len())
                .map(|i| args.opt(i).map(str::to_owned))
                .collect(),
            StepMatch::Undefined => panic!("undefined: {}", text),
            StepMatch::Ambiguous(p) => panic!("ambiguous: {} {:?}", text, p),
        }
    }

    #[test]
    fn test_every_token_service_step_resolves_uniquely() {
        let steps = [
            (StepKind::Given, "A Hedera account with more than 10 hbar"),
            (StepKind::Given, "A first hedera account with more than 10 hbar"),
            (StepKind::Given, "A second Hedera account"),
            (StepKind::Given, "A token named Test Token (HTT) with 1000 tokens"),
            (StepKind::Given, "The first account holds 100 HTT tokens"),
            (StepKind::Given, "A first hedera account with more than 2 hbar and 100 HTT tokens"),
            (StepKind::Given, "A third Hedera account with 0 hbar and 100 HTT tokens"),
            (StepKind::When, "I create a token named Test Token (HTT)"),
            (StepKind::When, "I create a fixed supply token named Test Token (HTT) with 1000 tokens"),
            (StepKind::When, "The first account creates a transaction to transfer 10 HTT tokens to the second account"),
            (StepKind::When, "A transaction is created to transfer 10 HTT tokens out of the first and second account and 5 HTT tokens into the third account and 15 HTT tokens into the fourth account"),
            (StepKind::When, "The second account has signed the transaction"),
            (StepKind::When, "The first account submits the transaction"),
            (StepKind::When, "The first account attempts to submit the transaction"),
            (StepKind::Then, "The token has the name \"Test Token\""),
            (StepKind::Then, "The token has the symbol \"HTT\""),
            (StepKind::Then, "The token has 2 decimals"),
            (StepKind::Then, "The token is owned by the account"),
            (StepKind::Then, "The total supply of the token is 1000"),
            (StepKind::Then, "An attempt to mint 1000 additional tokens succeeds"),
            (StepKind::Then, "An attempt to mint tokens fails"),
            (StepKind::Then, "The fourth account holds 115 HTT tokens"),
            (StepKind::Then, "The first account has paid for the transaction fee"),
            (StepKind::Then, "The transaction succeeds"),
            (StepKind::Then, "The transaction fails with INSUFFICIENT_TOKEN_BALANCE"),
        ];
        for (kind, text) in steps {
            lookup(kind, text);
        }
    }

    #[test]
    fn test_captures() {
        assert_eq!(
            lookup(StepKind::Given, "A token named Test Token (HTT) with 1000 tokens"),
            vec![
                Some("Test Token".to_owned()),
                Some("HTT".to_owned()),
                Some("1000".to_owned())
            ]
        );

        let funded = lookup(StepKind::Given, "A second Hedera account with 0 hbar and 100 HTT tokens");
        assert_eq!(funded[0].as_deref(), Some("second"));
        assert_eq!(funded[1], None);
        assert_eq!(funded[2].as_deref(), Some("0"));

        let strict = lookup(
            StepKind::Given,
            "A first hedera account with more than 2 hbar and 100 HTT tokens",
        );
        assert_eq!(strict[1].as_deref(), Some("more than "));
    }
}
