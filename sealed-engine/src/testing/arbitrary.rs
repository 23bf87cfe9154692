use crate::{
    handle::{Handle, HandleId},
    value::{Party, Plaintext, ValueType},
};
use proptest::{
    arbitrary::{any, Arbitrary},
    prop_oneof,
    strategy::{BoxedStrategy, Strategy},
};

impl Arbitrary for Party {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with((): Self::Parameters) -> Self::Strategy {
        any::<[u8; Party::BYTES_LEN]>().prop_map(Party::new).boxed()
    }
}

impl Arbitrary for Plaintext {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with((): Self::Parameters) -> Self::Strategy {
        prop_oneof![
            any::<bool>().prop_map(Plaintext::Bool),
            any::<u8>().prop_map(Plaintext::U8),
            any::<u16>().prop_map(Plaintext::U16),
            any::<u32>().prop_map(Plaintext::U32),
            any::<u64>().prop_map(Plaintext::U64),
            any::<u128>().prop_map(Plaintext::U128),
            any::<Party>().prop_map(Plaintext::Address),
        ]
        .boxed()
    }
}

impl Arbitrary for Handle {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with((): Self::Parameters) -> Self::Strategy {
        (any::<[u8; HandleId::BYTES_LEN]>(), any::<ValueType>())
            .prop_map(|(id, ty)| Handle::new(HandleId::from_bytes(id), ty))
            .boxed()
    }
}
