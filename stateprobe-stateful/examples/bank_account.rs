//! Example: a bank account with an off-by-one overdraft check
//!
//! Shows how to describe your own machine: a model with domain errors, rules
//! with generated arguments and preconditions, a model invariant, and an
//! observed invariant comparing the model with the subject's balance.

use serde::{Deserialize, Serialize};
use stateprobe_stateful::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum AccountError {
    InsufficientFunds,
    AccountFrozen,
}

#[derive(Debug, Clone, Default)]
struct AccountModel {
    balance: i64,
    frozen: bool,
}

impl Model for AccountModel {
    type Reason = AccountError;
    type Snapshot = i64;
}

/// The implementation under test: withdrawals may overdraw by one unit
#[derive(Debug, Default)]
struct Account {
    balance: i64,
    frozen: bool,
}

impl Subject<AccountModel> for Account {
    fn apply(&mut self, rule: &str, args: &[Value]) -> Result<Outcome<AccountError>, SubjectError> {
        let amount = || {
            args.first()
                .and_then(Value::as_int)
                .ok_or_else(|| SubjectError::Transport(format!("{rule} expects an amount")))
        };
        match rule {
            "deposit" => {
                if self.frozen {
                    return Ok(Outcome::failure(AccountError::AccountFrozen));
                }
                self.balance += amount()?;
                Ok(Outcome::success(self.balance))
            }
            "withdraw" => {
                let amount = amount()?;
                if self.frozen {
                    Ok(Outcome::failure(AccountError::AccountFrozen))
                } else if amount > self.balance + 1 {
                    Ok(Outcome::failure(AccountError::InsufficientFunds))
                } else {
                    self.balance -= amount;
                    Ok(Outcome::success(self.balance))
                }
            }
            "freeze" => {
                self.frozen = true;
                Ok(Outcome::ok())
            }
            "unfreeze" => {
                self.frozen = false;
                Ok(Outcome::ok())
            }
            other => Err(SubjectError::Unsupported(other.to_string())),
        }
    }

    fn observe(&self) -> Option<i64> {
        Some(self.balance)
    }
}

fn account_machine() -> Result<StateMachine<AccountModel>, EngineError> {
    let deposit = Rule::new("deposit", |account: &mut AccountModel, args| {
        if account.frozen {
            return Ok(Outcome::failure(AccountError::AccountFrozen));
        }
        account.balance += args.int(0)?;
        Ok(Outcome::success(account.balance))
    })
    .arg("amount", ValueGenerator::new(IntGenerator::new(1i64, 500)?))
    .with_weight(3);

    let withdraw = Rule::new("withdraw", |account: &mut AccountModel, args| {
        let amount = args.int(0)?;
        if account.frozen {
            Ok(Outcome::failure(AccountError::AccountFrozen))
        } else if amount > account.balance {
            Ok(Outcome::failure(AccountError::InsufficientFunds))
        } else {
            account.balance -= amount;
            Ok(Outcome::success(account.balance))
        }
    })
    .arg("amount", ValueGenerator::new(IntGenerator::new(1i64, 500)?))
    .with_weight(3);

    let freeze = Rule::new("freeze", |account: &mut AccountModel, _| {
        account.frozen = true;
        Ok(Outcome::ok())
    })
    .precondition(|account: &AccountModel| !account.frozen);

    let unfreeze = Rule::new("unfreeze", |account: &mut AccountModel, _| {
        account.frozen = false;
        Ok(Outcome::ok())
    })
    .precondition(|account: &AccountModel| account.frozen);

    Ok(StateMachine::new(AccountModel::default())
        .rule(deposit)
        .rule(withdraw)
        .rule(freeze)
        .rule(unfreeze)
        .invariant("balance_non_negative", |account: &AccountModel| account.balance >= 0)
        .observed_invariant("balance_matches", |account: &AccountModel, balance: &i64| {
            Check::equal(account.balance, *balance)
        }))
}

fn main() -> Result<(), EngineError> {
    println!("Testing a bank account with stateful property testing\n");

    let config = CampaignConfig::default().seed(7).max_examples(500).max_steps_per_sequence(30);
    let campaign = Campaign::new(account_machine()?, Account::default, config)?;
    let report = campaign.run()?;

    println!("{report}");
    match report.first_failure() {
        Some(record) => {
            println!("{record}");
            match record.to_json() {
                Ok(json) => println!("\nFailure record:\n{json}"),
                Err(err) => println!("\nCould not serialize the record: {err}"),
            }
        }
        None => println!("No discrepancy found; try more examples or another seed"),
    }

    Ok(())
}
