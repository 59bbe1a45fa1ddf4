//! Property tests for the voucher invariants: value is conserved over any
//! sequence of transfers, any change to signed data fails verification,
//! and a voucher's status depends on its content alone.

use proptest::prelude::*;
use proptest::sample::Index;

use minuto_protocol::codec::{canonical_bytes, decode};
use minuto_protocol::crypto::MinutoKeypair;
use minuto_protocol::identity::{Gender, Identity, PersonInfo};
use minuto_protocol::transaction::apply_transfer;
use minuto_protocol::voucher::{
    sign_as_creator, sign_as_guarantor, verify_voucher, Amount, Voucher, VoucherDraft,
};
use minuto_protocol::wallet::{
    classify, receive, send, PaymentError, VoucherCollection, VoucherStatus,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn identity() -> Identity {
    Identity::from_keypair(MinutoKeypair::generate()).unwrap()
}

fn card(first: &str, city: &str) -> PersonInfo {
    let mut person = PersonInfo::named(first, "Example");
    person.city = city.into();
    person.email = format!("{}@example.org", first.to_lowercase());
    person.phone = "+49 30 1234567".into();
    person.gender = Gender::Female;
    person.coordinates = "52.52,13.40".into();
    person
}

/// A finalized voucher worth `face`, guaranteed by two fresh parties.
fn issue(creator: &Identity, face: Amount) -> Voucher {
    let draft = VoucherDraft::new(card("Ada", "Berlin"), face, "Berlin")
        .description("garden work")
        .footnote("thank you");
    let mut voucher = Voucher::create(creator, draft).unwrap();
    sign_as_guarantor(&mut voucher, &identity(), &card("Grace", "Hamburg")).unwrap();
    sign_as_guarantor(&mut voucher, &identity(), &card("Alan", "Leipzig")).unwrap();
    sign_as_creator(&mut voucher, creator).unwrap();
    voucher
}

/// One transfer: which live fragment pays, who receives, and what share
/// of the fragment (per mille, at least one unit) goes.
type Step = (Index, Index, u16);

fn steps(max: usize) -> impl Strategy<Value = Vec<Step>> {
    prop::collection::vec((any::<Index>(), any::<Index>(), 1u16..=1000), 0..max)
}

/// Every copy someone keeps, with the index of the holder keeping it.
struct Circulation {
    holders: Vec<Identity>,
    held: Vec<(usize, Voucher)>,
}

impl Circulation {
    fn new(face: Amount, parties: usize) -> Self {
        let holders: Vec<Identity> = (0..parties).map(|_| identity()).collect();
        let first = issue(&holders[0], face);
        Self {
            holders,
            held: vec![(0, first)],
        }
    }

    fn available(&self, slot: usize) -> Amount {
        let (holder, voucher) = &self.held[slot];
        voucher.amount_available_to(self.holders[*holder].id())
    }

    fn total(&self) -> u64 {
        (0..self.held.len()).map(|slot| self.available(slot).units()).sum()
    }

    /// Apply one step. The payer's copy takes the new record and the
    /// payee keeps a clone of it.
    fn apply(&mut self, (payer, payee, share): Step) {
        let spendable: Vec<usize> = (0..self.held.len())
            .filter(|slot| !self.available(*slot).is_zero())
            .collect();
        let slot = spendable[payer.index(spendable.len())];
        let from = self.held[slot].0;
        let others: Vec<usize> = (0..self.holders.len()).filter(|h| *h != from).collect();
        let to = others[payee.index(others.len())];

        let available = self.available(slot).units();
        let amount = Amount::from_units((available * u64::from(share) / 1000).max(1));
        apply_transfer(&mut self.held[slot].1, &self.holders[from], self.holders[to].id(), amount)
            .unwrap();
        let received = self.held[slot].1.clone();
        self.held.push((to, received));
    }
}

/// Ways to change a finalized voucher after everyone signed it.
#[derive(Debug, Clone)]
enum Tamper {
    Creation(usize),
    GuarantorInfo(usize, usize),
    GuarantorSignature(usize, Index),
    CreatorSignature(Index),
}

const CREATION_FIELDS: usize = 11;
const GUARANTOR_FIELDS: usize = 8;

fn tamper() -> impl Strategy<Value = Tamper> {
    prop_oneof![
        (0..CREATION_FIELDS).prop_map(Tamper::Creation),
        (0..2usize, 0..GUARANTOR_FIELDS)
            .prop_map(|(entry, field)| Tamper::GuarantorInfo(entry, field)),
        (0..2usize, any::<Index>()).prop_map(|(entry, at)| Tamper::GuarantorSignature(entry, at)),
        any::<Index>().prop_map(Tamper::CreatorSignature),
    ]
}

fn touch(text: &mut String) {
    text.push('!');
}

/// Replace one hex digit of `hex` with a different one.
fn flip_hex_digit(hex: &mut String, at: Index) {
    let i = at.index(hex.len());
    let replacement = if hex.as_bytes()[i] == b'0' { "1" } else { "0" };
    hex.replace_range(i..=i, replacement);
}

fn other_gender(gender: Gender) -> Gender {
    match gender {
        Gender::Female => Gender::Male,
        Gender::Male | Gender::Unknown => Gender::Female,
    }
}

fn apply_tamper(voucher: &mut Voucher, tamper: &Tamper) {
    match tamper {
        Tamper::Creation(field) => {
            let creation = &mut voucher.creation;
            match field {
                0 => touch(&mut creation.voucher_id),
                1 => touch(&mut creation.currency),
                2 => touch(&mut creation.creator_id),
                3 => touch(&mut creation.creator.city),
                4 => creation.amount = Amount::from_units(creation.amount.units() + 1),
                5 => touch(&mut creation.region),
                6 => creation.creation_date += 1,
                7 => creation.validity -= 1,
                8 => touch(creation.description.get_or_insert_with(String::new)),
                9 => touch(creation.footnote.get_or_insert_with(String::new)),
                _ => creation.is_test_voucher = !creation.is_test_voucher,
            }
        }
        Tamper::GuarantorInfo(entry, field) => {
            let info = &mut voucher.guarantor_signatures[*entry].guarantor_info;
            match field {
                0 => touch(&mut info.id),
                1 => touch(&mut info.name),
                2 => touch(&mut info.address),
                3 => info.gender = other_gender(info.gender),
                4 => touch(&mut info.email),
                5 => touch(&mut info.phone),
                6 => touch(&mut info.coordinates),
                _ => info.signature_time += 1,
            }
        }
        Tamper::GuarantorSignature(entry, at) => {
            flip_hex_digit(&mut voucher.guarantor_signatures[*entry].signature, *at);
        }
        Tamper::CreatorSignature(at) => {
            if let Some(signature) = voucher.creator_signature.as_mut() {
                flip_hex_digit(signature, *at);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Across every holder's copies, what can be spent always adds up to
    /// the face value, and every copy still verifies.
    #[test]
    fn transfers_conserve_face_value(face in 1u64..=100_000, path in steps(12)) {
        let mut circulation = Circulation::new(Amount::from_units(face), 4);
        for step in path {
            circulation.apply(step);
            prop_assert_eq!(circulation.total(), face);
        }
        for (_, voucher) in &circulation.held {
            prop_assert!(verify_voucher(voucher).is_ok());
        }
    }

    /// Changing any signed field or any signature digit is caught.
    #[test]
    fn any_change_to_signed_data_fails_verification(tamper in tamper()) {
        let creator = identity();
        let mut voucher = issue(&creator, Amount::from_units(5_000));
        prop_assert!(verify_voucher(&voucher).is_ok());

        apply_tamper(&mut voucher, &tamper);
        prop_assert!(verify_voucher(&voucher).is_err(), "undetected: {:?}", tamper);
    }

    /// Classification is a function of content: asking again, or asking
    /// about a copy decoded from disk, gives the same answer.
    #[test]
    fn classification_is_stable_for_unchanged_history(path in steps(8)) {
        let mut circulation = Circulation::new(Amount::from_units(10_000), 3);
        for step in path {
            circulation.apply(step);
        }
        for (holder, voucher) in &circulation.held {
            let id = circulation.holders[*holder].id();
            let status = classify(voucher, id);
            prop_assert_eq!(classify(voucher, id), status);
            let spent = voucher.amount_available_to(id).is_zero();
            prop_assert_eq!(status == VoucherStatus::Used, spent);

            let reloaded: Voucher = decode(&canonical_bytes(voucher).unwrap()).unwrap();
            prop_assert_eq!(classify(&reloaded, id), status);

            let mut wallet = VoucherCollection::new(id);
            prop_assert_eq!(wallet.insert(reloaded.clone()), Some(status));
            prop_assert_eq!(wallet.insert(reloaded), None);
        }
    }

    /// A payment moves exactly the requested amount; asking for more than
    /// the wallet holds changes nothing.
    #[test]
    fn payments_move_exactly_the_amount(
        faces in prop::collection::vec(1u64..=20_000, 1..6),
        pick in any::<Index>(),
    ) {
        let alice = identity();
        let bob = identity();
        let mut wallet = VoucherCollection::new(alice.id());
        for face in &faces {
            wallet.insert(issue(&alice, Amount::from_units(*face)));
        }
        let total: u64 = faces.iter().sum();

        let too_much = Amount::from_units(total + 1);
        let before: Vec<Voucher> = wallet.iter().map(|(_, v)| v.clone()).collect();
        let refused = matches!(
            send(&mut wallet, &alice, bob.id(), too_much),
            Err(PaymentError::InsufficientFunds { .. })
        );
        prop_assert!(refused);
        let after: Vec<Voucher> = wallet.iter().map(|(_, v)| v.clone()).collect();
        prop_assert_eq!(after, before);

        let amount = Amount::from_units(1 + pick.index(total as usize) as u64);
        let bundle = send(&mut wallet, &alice, bob.id(), amount).unwrap();
        prop_assert_eq!(bundle.amount, amount);
        prop_assert_eq!(
            wallet.total_available(VoucherStatus::Own).units(),
            total - amount.units()
        );

        let mut bob_wallet = VoucherCollection::new(bob.id());
        receive(&mut bob_wallet, bundle).unwrap();
        prop_assert_eq!(bob_wallet.total_available(VoucherStatus::Other), amount);
    }
}
