use super::*;
use crate::account::{AccountRules, AccountType};
use crate::ledger::LedgerSource;
use crate::lifecycle::ReviewState;
use crate::savings::types::{AmountTier, DateTier, YearTier};
use chrono::{DateTime, TimeZone, Utc};
use coopbank_shared::types::{
    BranchId, BrowseReferenceId, Currency, GeneralLedgerId, GeneratedSavingsInterestId,
    MemberProfileId, MemberTypeHistoryId, OrganizationId, Scope, UserId,
};
use rstest::rstest;
use rust_decimal_macros::dec;

fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
}

struct World {
    scope: Scope,
    member: MemberProfile,
    account: Account,
    histories: Vec<MemberTypeHistory>,
    entries: Vec<GeneralLedgerEntry>,
}

impl World {
    fn new() -> Self {
        let scope = Scope::new(OrganizationId::new(), BranchId::new());
        let member_type = MemberTypeId::new();
        let member = MemberProfile {
            id: MemberProfileId::new(),
            scope,
            full_name: "Ana Santos".to_string(),
            member_type_id: Some(member_type),
            is_mutual_fund_member: false,
            created_at: at(2019, 6, 1),
        };
        let account = Account {
            id: AccountId::new(),
            scope,
            name: "Regular Savings".to_string(),
            currency: Currency::new("USD", chrono_tz::UTC),
            rules: AccountRules::new(AccountType::Deposit),
            created_at: at(2019, 1, 1),
            updated_at: at(2019, 1, 1),
        };
        let histories = vec![MemberTypeHistory {
            id: MemberTypeHistoryId::new(),
            scope,
            member_profile_id: member.id,
            member_type_id: member_type,
            created_at: at(2019, 6, 1),
        }];
        Self {
            scope,
            member,
            account,
            histories,
            entries: Vec::new(),
        }
    }

    /// Appends a chain entry that leaves the balance at `balance`.
    fn balance_on(&mut self, date: DateTime<Utc>, balance: Decimal) {
        let previous = self.entries.last().map_or(Decimal::ZERO, |e| e.balance);
        let change = balance - previous;
        self.entries.push(GeneralLedgerEntry {
            id: GeneralLedgerId::new(),
            scope: self.scope,
            account_id: self.account.id,
            member_profile_id: Some(self.member.id),
            account_type: AccountType::Deposit,
            source: LedgerSource::Deposit,
            debit: if change.is_sign_negative() { -change } else { Decimal::ZERO },
            credit: if change.is_sign_positive() { change } else { Decimal::ZERO },
            previous_balance: previous,
            balance,
            seq: self.entries.len() as u64 + 1,
            entry_date: date,
            transaction_batch_id: None,
            transaction_id: None,
            loan_transaction_id: None,
            payment_type_id: None,
            reference_number: String::new(),
            description: String::new(),
            created_by: UserId::new(),
            created_at: date,
        });
    }

    fn ledger(&self) -> MemberLedger<'_> {
        MemberLedger {
            member: &self.member,
            account: &self.account,
            entries: &self.entries,
            histories: &self.histories,
        }
    }

    fn reference(&self) -> BrowseReference {
        BrowseReference {
            id: BrowseReferenceId::new(),
            scope: self.scope,
            name: "Regular".to_string(),
            account_id: self.account.id,
            member_type_id: None,
            interest_rate: dec!(3.6),
            minimum_balance: dec!(500),
            charges: Decimal::ZERO,
            interest_type: InterestType::Amount,
            year_tiers: Vec::new(),
            date_tiers: Vec::new(),
            amount_tiers: Vec::new(),
        }
    }

    fn run(
        &self,
        kind: SavingsComputationType,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> GeneratedSavingsInterest {
        GeneratedSavingsInterest {
            id: GeneratedSavingsInterestId::new(),
            scope: self.scope,
            document_no: "SI-0001".to_string(),
            last_computation_date: from,
            new_computation_date: to,
            account_id: Some(self.account.id),
            member_type_id: None,
            computation_type: kind,
            interest_tax_rate: dec!(20),
            total_interest: Decimal::ZERO,
            total_tax: Decimal::ZERO,
            review: ReviewState::default(),
            created_by: UserId::new(),
            created_at: to,
        }
    }
}

/// 10,000 from mid-December, 15,000 from January 16.
fn january_world() -> World {
    let mut world = World::new();
    world.balance_on(at(2025, 12, 15), dec!(10000));
    world.balance_on(at(2026, 1, 16), dec!(15000));
    world
}

fn generate(world: &World, run: &GeneratedSavingsInterest) -> Option<GeneratedSavingsInterestEntry> {
    let params = SavingsParams::for_run(run, dec!(360)).unwrap();
    generate_entry(run, &world.reference(), world.ledger(), &params).unwrap()
}

#[rstest]
#[case(SavingsComputationType::DailyLowestBalance, dec!(30.00), dec!(6.00))]
#[case(SavingsComputationType::AverageDailyBalance, dec!(37.50), dec!(7.50))]
#[case(SavingsComputationType::MonthlyEndBalanceTotal, dec!(45.00), dec!(9.00))]
fn test_interest_by_computation_type(
    #[case] kind: SavingsComputationType,
    #[case] interest: Decimal,
    #[case] tax: Decimal,
) {
    let world = january_world();
    let run = world.run(kind, at(2026, 1, 1), at(2026, 1, 31));
    let entry = generate(&world, &run).unwrap();

    assert_eq!(entry.interest_amount, interest);
    assert_eq!(entry.interest_tax, tax);
    assert_eq!(entry.ending_balance, dec!(15000) + interest - tax);
    assert_eq!(entry.generated_savings_interest_id, run.id);
}

#[test]
fn test_month_end_total_spans_months() {
    let mut world = january_world();
    world.balance_on(at(2026, 2, 10), dec!(12000));
    let run = world.run(
        SavingsComputationType::MonthlyEndBalanceTotal,
        at(2026, 1, 16),
        at(2026, 2, 16),
    );

    // January 16..31 at 15,000 and February 1..15 at the 12,000 month end.
    let entry = generate(&world, &run).unwrap();
    assert_eq!(entry.interest_amount, dec!(42.00));
}

#[test]
fn test_non_taxable_account_withholds_nothing() {
    let mut world = january_world();
    world.account.rules.taxable = false;
    let run = world.run(SavingsComputationType::DailyLowestBalance, at(2026, 1, 1), at(2026, 1, 31));

    let entry = generate(&world, &run).unwrap();
    assert_eq!(entry.interest_amount, dec!(30.00));
    assert_eq!(entry.interest_tax, Decimal::ZERO);
    assert_eq!(entry.ending_balance, dec!(15030.00));
}

#[test]
fn test_below_minimum_charges_or_skips() {
    let mut world = World::new();
    world.balance_on(at(2025, 12, 1), dec!(300));
    let run = world.run(SavingsComputationType::AverageDailyBalance, at(2026, 1, 1), at(2026, 1, 31));
    assert!(generate(&world, &run).is_none());

    let mut reference = world.reference();
    reference.charges = dec!(25);
    let params = SavingsParams::for_run(&run, dec!(360)).unwrap();
    let entry = generate_entry(&run, &reference, world.ledger(), &params)
        .unwrap()
        .unwrap();
    assert_eq!(entry.interest_amount, dec!(-25));
    assert_eq!(entry.interest_tax, Decimal::ZERO);
    assert_eq!(entry.ending_balance, dec!(275));
    assert_eq!(entry.net(), dec!(-25));
}

#[test]
fn test_zero_and_empty_ledgers_skipped() {
    let mut world = World::new();
    let run = world.run(SavingsComputationType::AverageDailyBalance, at(2026, 1, 1), at(2026, 1, 31));
    assert!(generate(&world, &run).is_none());

    world.balance_on(at(2025, 12, 1), dec!(1000));
    world.balance_on(at(2026, 1, 20), Decimal::ZERO);
    assert!(generate(&world, &run).is_none());
}

#[rstest]
#[case(SavingsComputationType::AdbEndBalance)]
#[case(SavingsComputationType::MonthlyEndLowestBalance)]
#[case(SavingsComputationType::MonthlyLowestBalanceAverage)]
#[case(SavingsComputationType::MonthlyEndBalanceAverage)]
fn test_unimplemented_computations_rejected(#[case] kind: SavingsComputationType) {
    let world = World::new();
    let run = world.run(kind, at(2026, 1, 1), at(2026, 1, 31));
    assert!(matches!(
        SavingsParams::for_run(&run, dec!(360)),
        Err(SavingsError::UnsupportedComputation(k)) if k == kind
    ));
}

#[test]
fn test_run_parameters_validated() {
    let world = World::new();
    let reversed = world.run(SavingsComputationType::DailyLowestBalance, at(2026, 2, 1), at(2026, 1, 1));
    assert!(matches!(
        SavingsParams::for_run(&reversed, dec!(360)),
        Err(SavingsError::InvalidWindow { .. })
    ));

    let run = world.run(SavingsComputationType::DailyLowestBalance, at(2026, 1, 1), at(2026, 2, 1));
    assert!(matches!(
        SavingsParams::for_run(&run, Decimal::ZERO),
        Err(SavingsError::InvalidDivisor(_))
    ));

    let mut taxed = run.clone();
    taxed.interest_tax_rate = dec!(120);
    assert!(matches!(
        SavingsParams::for_run(&taxed, dec!(365)),
        Err(SavingsError::InvalidTaxRate(_))
    ));
}

#[test]
fn test_rate_tiers() {
    let world = january_world();
    let mut reference = world.reference();

    reference.interest_type = InterestType::Year;
    reference.year_tiers = vec![
        YearTier { from_year: 2010, to_year: 2014, interest_rate: dec!(2) },
        YearTier { from_year: 2015, to_year: 2020, interest_rate: dec!(5) },
    ];
    assert_eq!(resolve_rate(&reference, &world.ledger(), dec!(15000)), dec!(5));

    reference.interest_type = InterestType::Date;
    reference.date_tiers = vec![DateTier {
        from_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
        to_date: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        interest_rate: dec!(4),
    }];
    // Type taken in 2019, outside every date tier.
    assert_eq!(resolve_rate(&reference, &world.ledger(), dec!(15000)), dec!(3.6));

    reference.interest_type = InterestType::Amount;
    reference.amount_tiers = vec![
        AmountTier { from_amount: dec!(0), to_amount: dec!(9999.99), interest_rate: dec!(1) },
        AmountTier { from_amount: dec!(10000), to_amount: dec!(50000), interest_rate: dec!(2.5) },
    ];
    assert_eq!(resolve_rate(&reference, &world.ledger(), dec!(15000)), dec!(2.5));
    assert_eq!(resolve_rate(&reference, &world.ledger(), dec!(80000)), dec!(3.6));
}

#[test]
fn test_select_reference_prefers_member_type() {
    let world = World::new();
    let general = world.reference();
    let mut typed = world.reference();
    typed.member_type_id = world.member.member_type_id;
    typed.interest_rate = dec!(6);
    let references = vec![general.clone(), typed.clone()];

    let picked = select_reference(&references, world.account.id, world.member.member_type_id).unwrap();
    assert_eq!(picked.id, typed.id);

    let picked = select_reference(&references, world.account.id, Some(MemberTypeId::new())).unwrap();
    assert_eq!(picked.id, general.id);

    assert!(select_reference(&references, AccountId::new(), None).is_none());
}

#[test]
fn test_plan_post_mirrors_and_totals() {
    let world = january_world();
    let run = world.run(SavingsComputationType::DailyLowestBalance, at(2026, 1, 1), at(2026, 1, 31));
    let entry = |interest: Decimal, tax: Decimal| GeneratedSavingsInterestEntry {
        id: GeneratedSavingsInterestEntryId::new(),
        scope: world.scope,
        generated_savings_interest_id: run.id,
        member_profile_id: MemberProfileId::new(),
        account_id: world.account.id,
        interest_amount: interest,
        interest_tax: tax,
        ending_balance: Decimal::ZERO,
    };
    let entries = vec![
        entry(dec!(30), dec!(6)),
        entry(dec!(-25), Decimal::ZERO),
        entry(Decimal::ZERO, Decimal::ZERO),
    ];

    let plain = plan_post(&entries, None);
    assert_eq!(plain.len(), 2);
    assert_eq!(plain[0].direction, EntryDirection::Credit);
    assert_eq!(plain[0].amount, dec!(24));
    assert_eq!(plain[1].direction, EntryDirection::Debit);
    assert_eq!(plain[1].amount, dec!(25));

    let expense = AccountId::new();
    let mirrored = plan_post(&entries, Some(expense));
    assert_eq!(mirrored.len(), 4);
    assert_eq!(mirrored[1].account_id, expense);
    assert_eq!(mirrored[1].member_profile_id, None);
    assert_eq!(mirrored[1].direction, EntryDirection::Debit);
    assert_eq!(mirrored[3].direction, EntryDirection::Credit);

    let totals = SavingsTotals::of(&entries);
    assert_eq!(totals.total_interest, dec!(5));
    assert_eq!(totals.total_tax, dec!(6));
}

#[test]
fn test_override_entry_reprojects_balance() {
    let world = january_world();
    let run = world.run(SavingsComputationType::DailyLowestBalance, at(2026, 1, 1), at(2026, 1, 31));
    let mut entry = generate(&world, &run).unwrap();
    override_entry(&mut entry, dec!(50), dec!(10), dec!(15000));
    assert_eq!(entry.ending_balance, dec!(15040));
}
