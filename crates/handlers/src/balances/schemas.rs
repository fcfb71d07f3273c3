//! Historical layouts of the Balances pallet on Polkadot.
//!
//! Up to runtime 9140 events were plain tuples; from 9140 on they carry
//! named fields.

use tally_core::schema::{Field, PayloadLayout, SchemaVariant};

use Field::{Account, Amount, Free, From, Reserved, Status, To};

fn who_amount() -> PayloadLayout {
    PayloadLayout::named(&[("who", Account), ("amount", Amount)])
}

fn account_amount() -> PayloadLayout {
    PayloadLayout::positional(&[Account, Amount])
}

/// Every known variant, oldest first per name.
pub fn variants() -> Vec<SchemaVariant> {
    vec![
        SchemaVariant::new(
            "balances.Transfer",
            "V0",
            "2082574713e816229f596f97b58d3debbdea4b002607df469a619e037cc11120",
            PayloadLayout::positional(&[From, To, Amount]),
        ),
        SchemaVariant::new(
            "balances.Transfer",
            "V1",
            "dad2bcdca357505fa3c7832085d0db53ce6f902bd9f5b52823ee8791d351872c",
            PayloadLayout::positional(&[From, To, Amount]),
        ),
        SchemaVariant::new(
            "balances.Transfer",
            "V9140",
            "68dcb27fbf3d9279c1115ef6dd9d30a3852b23d8e91c1881acd12563a212512d",
            PayloadLayout::named(&[("from", From), ("to", To), ("amount", Amount)]),
        ),
        SchemaVariant::new(
            "balances.Transfer",
            "V913010",
            "0ffdf35c495114c2d42a8bf6c241483fd5334ca0198662e14480ad040f1e3a66",
            PayloadLayout::named(&[("from", From), ("to", To), ("amount", Amount)]),
        ),
        SchemaVariant::new(
            "balances.BalanceSet",
            "V0",
            "d421956a1335ab158b6fe30df5b9da4aef5390686df5a1834f9ecdfbc7de2f4c",
            PayloadLayout::positional(&[Account, Free, Reserved]),
        ),
        SchemaVariant::new(
            "balances.BalanceSet",
            "V9140",
            "83f90320fcee34b0ccab7d8893f1c4f21dfe5ef623391171b12b112107efa2b1",
            PayloadLayout::named(&[("who", Account), ("free", Free), ("reserved", Reserved)]),
        ),
        SchemaVariant::new(
            "balances.Deposit",
            "V0",
            "f51ef257475aaeac42946f50fe382d5b09a9bf43dca39fda2ca4e910eba6aef9",
            account_amount(),
        ),
        SchemaVariant::new(
            "balances.Deposit",
            "V9140",
            "042054185e0c4221bfb671c8699bcdbefc2f6daba2dddfe3c36a647fd3bf8f88",
            who_amount(),
        ),
        SchemaVariant::new(
            "balances.DustLost",
            "V0",
            "665405e48e50f88b3e9aef4af845e495875cfb57074dc9e042ffc7851a9395fe",
            account_amount(),
        ),
        SchemaVariant::new(
            "balances.DustLost",
            "V9140",
            "a5120e116c962665deb90888f63997f80bf264736905d1919c950d4ec72b8135",
            PayloadLayout::named(&[("account", Account), ("amount", Amount)]),
        ),
        SchemaVariant::new(
            "balances.Endowed",
            "V0",
            "5e8eead75d4236ce45cf29892b546ec7a41a4f416f08224c955075db6fb69abc",
            account_amount(),
        ),
        SchemaVariant::new(
            "balances.Endowed",
            "V9140",
            "11ab78688223cb378b33ad036f9e746b6b063bc2df7a3250d58ea34ae6c4771f",
            PayloadLayout::named(&[("account", Account), ("freeBalance", Amount)]),
        ),
        SchemaVariant::new(
            "balances.ReserveRepatriated",
            "V8",
            "c85af07714e8ecb8a136e2fb5a75a22903288eceaa020d306582756499751864",
            PayloadLayout::positional(&[From, To, Amount, Status]),
        ),
        SchemaVariant::new(
            "balances.ReserveRepatriated",
            "V9140",
            "258088f3091b3ed69ad6c19a26b970315b35949bca136ef52b036d10f5c98170",
            PayloadLayout::named(&[
                ("from", From),
                ("to", To),
                ("amount", Amount),
                ("destinationStatus", Status),
            ]),
        ),
        SchemaVariant::new(
            "balances.Reserved",
            "V8",
            "4ba39217ef8c12679f58387393213f376d8243c2ad23a265c08d029f3e36e9f0",
            account_amount(),
        ),
        SchemaVariant::new(
            "balances.Reserved",
            "V9140",
            "086dab867f35715cb62257a9ecba6b7fe895885e87598482c4888d2fe1cb73d4",
            who_amount(),
        ),
        SchemaVariant::new(
            "balances.Unreserved",
            "V8",
            "0d84afc1cb044aa1a584fe72c9b1b0e420575bf6940b26e88a482328af6d7c77",
            account_amount(),
        ),
        SchemaVariant::new(
            "balances.Unreserved",
            "V9140",
            "ab10c2de5bc4158553e3a9e616bbe18ae186166f3b08734579777a05b485f8bb",
            who_amount(),
        ),
        SchemaVariant::new(
            "balances.Slashed",
            "V9122",
            "6c9f0cff25c6028cde08edbd5d172a256cc5441d3debeb283d9fe72a58cd08da",
            account_amount(),
        ),
        SchemaVariant::new(
            "balances.Slashed",
            "V9140",
            "20ecfc9158e36663830a8e3932996d1284032a25c6c1416f814bcee83a31147b",
            who_amount(),
        ),
        SchemaVariant::new(
            "balances.Withdraw",
            "V9122",
            "1234432de1c8e08e2dc708d5425e082faaaf23e79ff22d274b71704c57bb2237",
            account_amount(),
        ),
        SchemaVariant::new(
            "balances.Withdraw",
            "V9140",
            "c215bc1c909253586ca430cd5d467093dcfc83a323efa63a29550508bc8c5408",
            who_amount(),
        ),
        // Calls
        SchemaVariant::new(
            "balances.transfer",
            "V5",
            "fc85bea9d0d171982f66e8a55667d58dc9a1612bcafe84309942bf47e23e3094",
            PayloadLayout::named(&[("dest", To), ("value", Amount)]),
        ),
        SchemaVariant::new(
            "balances.transfer_keep_alive",
            "V5",
            "fc85bea9d0d171982f66e8a55667d58dc9a1612bcafe84309942bf47e23e3094",
            PayloadLayout::named(&[("dest", To), ("value", Amount)]),
        ),
        SchemaVariant::new(
            "balances.force_transfer",
            "V5",
            "e5944fbe8224a17fe49f9c1d1d01efaf87fb1778fd39618512af54c9ba6f9dff",
            PayloadLayout::named(&[("source", From), ("dest", To), ("value", Amount)]),
        ),
        SchemaVariant::new(
            "balances.transfer_all",
            "V5",
            "9c94c2ca9979f6551af6e123fb6b6ba14d026f862f9a023706f8f88c556b355f",
            PayloadLayout::named(&[("dest", To), ("keepAlive", Field::Skip)]),
        ),
    ]
}
