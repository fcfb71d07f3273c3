//! Historical layouts of the Staking pallet on Polkadot.

use tally_core::schema::{Field, PayloadLayout, SchemaVariant};

const STASH_AMOUNT: &[Field] = &[Field::Account, Field::Amount];

/// Every known variant, oldest first per name.
pub fn variants() -> Vec<SchemaVariant> {
    vec![
        // Events
        SchemaVariant::new(
            "staking.Bonded",
            "V0",
            "47facb114cad5e5d0612ab12cd27899aed054423f61b0ee4027c8d49284108a0",
            PayloadLayout::positional(STASH_AMOUNT),
        ),
        SchemaVariant::new(
            "staking.Unbonded",
            "V0",
            "285f3d8850d41cfb19105193c25afbd8f44056ce2ac4b135a1fa1607c5eb5f96",
            PayloadLayout::positional(STASH_AMOUNT),
        ),
        SchemaVariant::new(
            "staking.Withdrawn",
            "V0",
            "7c8d62b0b7929c5620715729b1a4142fc288b28f3dcd67e9d58303a2bea399d3",
            PayloadLayout::positional(STASH_AMOUNT),
        ),
        SchemaVariant::new(
            "staking.Reward",
            "V0",
            "0932e6d4b4a568796adb7119d09859e0df58228c7394b5d0173a5c5ce093a34d",
            PayloadLayout::positional(STASH_AMOUNT),
        ),
        SchemaVariant::new(
            "staking.Rewarded",
            "V9090",
            "0fb941f3870a0949228cdacebcebdb221028e93af89d7c2935bb73d066386b13",
            PayloadLayout::positional(STASH_AMOUNT),
        ),
        SchemaVariant::new(
            "staking.Slash",
            "V0",
            "9642dd0541643e506f19da33b70f164668e0832df885607cb887c01fe713159b",
            PayloadLayout::positional(STASH_AMOUNT),
        ),
        SchemaVariant::new(
            "staking.Slashed",
            "V9090",
            "f6a852921cc26702b5320a65eeb483c7cd25e856e09e930a476eeb05dae41665",
            PayloadLayout::positional(STASH_AMOUNT),
        ),
        // Calls
        SchemaVariant::new(
            "staking.bond",
            "V5",
            "7542f449b41e8c49c12ddbd62aeda39465af36ff0f9bd5278acfbe1783981931",
            PayloadLayout::named(&[("controller", Field::Skip), ("value", Field::Amount)]),
        ),
        SchemaVariant::new(
            "staking.bond_extra",
            "V5",
            "f92c56c980d6a55c468653fc3149548edcf2481e5da53835a201cafa7dc02fd8",
            PayloadLayout::named(&[("maxAdditional", Field::Amount)]),
        ),
        SchemaVariant::new(
            "staking.unbond",
            "V5",
            "d13cb91c3f61510beece366e7f7c2d0705f01d70f9bc28721d2437cd210a3372",
            PayloadLayout::named(&[("value", Field::Amount)]),
        ),
    ]
}
