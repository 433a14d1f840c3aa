use proptest::prelude::*;

use siroc_core::version::derive_version_at;

proptest! {
    #[test]
    fn stamped_versions_keep_the_release_triple(
        major in 0u64..100,
        minor in 0u64..100,
        patch in 0u64..100,
        minutes in 0u64..100_000_000,
        commit in "[0-9a-f]{7}",
    ) {
        let base = format!("{}.{}.{}", major, minor, patch);
        let stamped = derive_version_at(&base, minutes, &commit).unwrap();

        prop_assert_eq!(&stamped, &format!("{}-{}.{}", base, minutes, commit));
        prop_assert!(semver::Version::parse(&stamped).is_ok());
    }

    #[test]
    fn restamping_is_stable(
        minutes in 0u64..100_000_000,
        later in 0u64..100_000_000,
        commit in "[0-9a-f]{7}",
    ) {
        let once = derive_version_at("2.3.4", minutes, &commit).unwrap();
        let twice = derive_version_at(&once, later, &commit).unwrap();
        prop_assert_eq!(twice, format!("2.3.4-{}.{}", later, commit));
    }
}
