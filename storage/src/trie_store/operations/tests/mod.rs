
use lmdb::DatabaseFlags;
use tempfile::{tempdir, TempDir};

use crate::{
    bytesrepr::{self, FromBytes, ToBytes},
    error,
    history::DEFAULT_MAX_READERS,
    shared::newtypes::Blake2bHash,
    store::Store,
    transaction_source::{
        in_memory::InMemoryEnvironment, lmdb::LmdbEnvironment, Readable, Transaction,
        TransactionSource,
    },
    trie::Trie,
    trie_store::{
        in_memory::InMemoryTrieStore,
        lmdb::LmdbTrieStore,
        operations::{read, write, ReadResult, WriteResult},
        TrieStore,
    },
};

const TEST_KEY_LENGTH: usize = 4;

/// A short key type for tests.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct TestKey([u8; TEST_KEY_LENGTH]);

impl ToBytes for TestKey {
    fn to_bytes(&self) -> Result<Vec<u8>, bytesrepr::Error> {
        Ok(self.0.to_vec())
    }

    fn serialized_length(&self) -> usize {
        TEST_KEY_LENGTH
    }
}

impl FromBytes for TestKey {
    fn from_bytes(bytes: &[u8]) -> Result<(Self, &[u8]), bytesrepr::Error> {
        let (key, rem) = bytes.split_at(TEST_KEY_LENGTH);
        let mut ret = [0u8; TEST_KEY_LENGTH];
        ret.copy_from_slice(key);
        Ok((TestKey(ret), rem))
    }
}

const TEST_VAL_LENGTH: usize = 6;

/// A short value type for tests.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct TestValue([u8; TEST_VAL_LENGTH]);

impl ToBytes for TestValue {
    fn to_bytes(&self) -> Result<Vec<u8>, bytesrepr::Error> {
        Ok(self.0.to_vec())
    }

    fn serialized_length(&self) -> usize {
        TEST_VAL_LENGTH
    }
}

impl FromBytes for TestValue {
    fn from_bytes(bytes: &[u8]) -> Result<(Self, &[u8]), bytesrepr::Error> {
        let (value, rem) = bytes.split_at(TEST_VAL_LENGTH);
        let mut ret = [0u8; TEST_VAL_LENGTH];
        ret.copy_from_slice(value);
        Ok((TestValue(ret), rem))
    }
}

type TestTrie = Trie<TestKey, TestValue>;

type InMemoryError = error::in_memory::Error;

const TEST_LEAVES_LENGTH: usize = 6;

/// Keys have been chosen deliberately and the `create_` functions below
/// depend on these exact definitions.  Values are arbitrary.
const TEST_LEAVES: [TestTrie; TEST_LEAVES_LENGTH] = [
    Trie::Leaf {
        key: TestKey([0u8, 0, 0, 0]),
        value: TestValue(*b"value0"),
    },
    Trie::Leaf {
        key: TestKey([0u8, 0, 0, 1]),
        value: TestValue(*b"value1"),
    },
    Trie::Leaf {
        key: TestKey([0u8, 0, 2, 0]),
        value: TestValue(*b"value2"),
    },
    Trie::Leaf {
        key: TestKey([0u8, 255, 0, 0]),
        value: TestValue(*b"value3"),
    },
    Trie::Leaf {
        key: TestKey([251u8, 0, 0, 0]),
        value: TestValue(*b"value4"),
    },
    Trie::Leaf {
        key: TestKey([0u8, 0, 2, 5]),
        value: TestValue(*b"value5"),
    },
];

/// The same keys as `TEST_LEAVES`, bound to different values.
const TEST_LEAVES_UPDATED: [TestTrie; TEST_LEAVES_LENGTH] = [
    Trie::Leaf {
        key: TestKey([0u8, 0, 0, 0]),
        value: TestValue(*b"valueA"),
    },
    Trie::Leaf {
        key: TestKey([0u8, 0, 0, 1]),
        value: TestValue(*b"valueB"),
    },
    Trie::Leaf {
        key: TestKey([0u8, 0, 2, 0]),
        value: TestValue(*b"valueC"),
    },
    Trie::Leaf {
        key: TestKey([0u8, 255, 0, 0]),
        value: TestValue(*b"valueD"),
    },
    Trie::Leaf {
        key: TestKey([251u8, 0, 0, 0]),
        value: TestValue(*b"valueE"),
    },
    Trie::Leaf {
        key: TestKey([0u8, 0, 2, 5]),
        value: TestValue(*b"valueF"),
    },
];

/// Keys which diverge from each other at their first byte, so that each
/// lives directly under the root.
const TEST_LEAVES_NON_COLLIDING: [TestTrie; TEST_LEAVES_LENGTH] = [
    Trie::Leaf {
        key: TestKey([0u8, 0, 0, 0]),
        value: TestValue(*b"valueA"),
    },
    Trie::Leaf {
        key: TestKey([1u8, 0, 0, 0]),
        value: TestValue(*b"valueB"),
    },
    Trie::Leaf {
        key: TestKey([2u8, 0, 0, 0]),
        value: TestValue(*b"valueC"),
    },
    Trie::Leaf {
        key: TestKey([3u8, 0, 0, 0]),
        value: TestValue(*b"valueD"),
    },
    Trie::Leaf {
        key: TestKey([4u8, 0, 0, 0]),
        value: TestValue(*b"valueE"),
    },
    Trie::Leaf {
        key: TestKey([5u8, 0, 0, 0]),
        value: TestValue(*b"valueF"),
    },
];

/// A pairing of a trie element and its hash.
#[derive(Debug, Clone, PartialEq, Eq)]
struct HashedTrie<K, V> {
    hash: Blake2bHash,
    trie: Trie<K, V>,
}

impl<K: ToBytes, V: ToBytes> HashedTrie<K, V> {
    fn new(trie: Trie<K, V>) -> Result<Self, bytesrepr::Error> {
        let hash = trie.trie_hash()?;
        Ok(HashedTrie { hash, trie })
    }
}

type HashedTestTrie = HashedTrie<TestKey, TestValue>;

fn hash_test_tries(tries: &[TestTrie]) -> Result<Vec<HashedTestTrie>, bytesrepr::Error> {
    tries
        .iter()
        .map(|trie| HashedTestTrie::new(trie.to_owned()))
        .collect()
}

type TrieGenerator = fn() -> Result<(Blake2bHash, Vec<HashedTestTrie>), bytesrepr::Error>;

const TEST_TRIE_GENERATORS_LENGTH: usize = 7;

/// `TEST_TRIE_GENERATORS[n]` builds, by hand, the trie which holds the first
/// `n` of `TEST_LEAVES`; writing `TEST_LEAVES[n]` to it must produce
/// `TEST_TRIE_GENERATORS[n + 1]`'s root.
const TEST_TRIE_GENERATORS: [TrieGenerator; TEST_TRIE_GENERATORS_LENGTH] = [
    create_0_leaf_trie,
    create_1_leaf_trie,
    create_2_leaf_trie,
    create_3_leaf_trie,
    create_4_leaf_trie,
    create_5_leaf_trie,
    create_6_leaf_trie,
];

fn create_0_leaf_trie() -> Result<(Blake2bHash, Vec<HashedTestTrie>), bytesrepr::Error> {
    let root = HashedTrie::new(Trie::node(&[]))?;

    let root_hash = root.hash;

    let tries = vec![root];

    Ok((root_hash, tries))
}

fn create_1_leaf_trie() -> Result<(Blake2bHash, Vec<HashedTestTrie>), bytesrepr::Error> {
    let leaves = hash_test_tries(&TEST_LEAVES[..1])?;

    let root = HashedTrie::new(Trie::node(&[(0, leaves[0].hash)]))?;

    let root_hash = root.hash;

    let parents = vec![root];

    let tries = {
        let mut ret = Vec::new();
        ret.extend(leaves);
        ret.extend(parents);
        ret
    };

    Ok((root_hash, tries))
}

fn create_2_leaf_trie() -> Result<(Blake2bHash, Vec<HashedTestTrie>), bytesrepr::Error> {
    let leaves = hash_test_tries(&TEST_LEAVES[..2])?;

    let node_3 = HashedTrie::new(Trie::node(&[(0, leaves[0].hash), (1, leaves[1].hash)]))?;

    let node_2 = HashedTrie::new(Trie::node(&[(0, node_3.hash)]))?;

    let node_1 = HashedTrie::new(Trie::node(&[(0, node_2.hash)]))?;

    let root = HashedTrie::new(Trie::node(&[(0, node_1.hash)]))?;

    let root_hash = root.hash;

    let parents = vec![root, node_1, node_2, node_3];

    let tries = {
        let mut ret = Vec::new();
        ret.extend(leaves);
        ret.extend(parents);
        ret
    };

    Ok((root_hash, tries))
}

fn create_3_leaf_trie() -> Result<(Blake2bHash, Vec<HashedTestTrie>), bytesrepr::Error> {
    let leaves = hash_test_tries(&TEST_LEAVES[..3])?;

    let node_3 = HashedTrie::new(Trie::node(&[(0, leaves[0].hash), (1, leaves[1].hash)]))?;

    let node_2 = HashedTrie::new(Trie::node(&[(0, node_3.hash), (2, leaves[2].hash)]))?;

    let node_1 = HashedTrie::new(Trie::node(&[(0, node_2.hash)]))?;

    let root = HashedTrie::new(Trie::node(&[(0, node_1.hash)]))?;

    let root_hash = root.hash;

    let parents = vec![root, node_1, node_2, node_3];

    let tries = {
        let mut ret = Vec::new();
        ret.extend(leaves);
        ret.extend(parents);
        ret
    };

    Ok((root_hash, tries))
}

fn create_4_leaf_trie() -> Result<(Blake2bHash, Vec<HashedTestTrie>), bytesrepr::Error> {
    let leaves = hash_test_tries(&TEST_LEAVES[..4])?;

    let node_3 = HashedTrie::new(Trie::node(&[(0, leaves[0].hash), (1, leaves[1].hash)]))?;

    let node_2 = HashedTrie::new(Trie::node(&[(0, node_3.hash), (2, leaves[2].hash)]))?;

    let node_1 = HashedTrie::new(Trie::node(&[(0, node_2.hash), (255, leaves[3].hash)]))?;

    let root = HashedTrie::new(Trie::node(&[(0, node_1.hash)]))?;

    let root_hash = root.hash;

    let parents = vec![root, node_1, node_2, node_3];

    let tries = {
        let mut ret = Vec::new();
        ret.extend(leaves);
        ret.extend(parents);
        ret
    };

    Ok((root_hash, tries))
}

fn create_5_leaf_trie() -> Result<(Blake2bHash, Vec<HashedTestTrie>), bytesrepr::Error> {
    let leaves = hash_test_tries(&TEST_LEAVES[..5])?;

    let node_3 = HashedTrie::new(Trie::node(&[(0, leaves[0].hash), (1, leaves[1].hash)]))?;

    let node_2 = HashedTrie::new(Trie::node(&[(0, node_3.hash), (2, leaves[2].hash)]))?;

    let node_1 = HashedTrie::new(Trie::node(&[(0, node_2.hash), (255, leaves[3].hash)]))?;

    let root = HashedTrie::new(Trie::node(&[(0, node_1.hash), (251, leaves[4].hash)]))?;

    let root_hash = root.hash;

    let parents = vec![root, node_1, node_2, node_3];

    let tries = {
        let mut ret = Vec::new();
        ret.extend(leaves);
        ret.extend(parents);
        ret
    };

    Ok((root_hash, tries))
}

fn create_6_leaf_trie() -> Result<(Blake2bHash, Vec<HashedTestTrie>), bytesrepr::Error> {
    let leaves = hash_test_tries(&TEST_LEAVES)?;

    let node_4 = HashedTrie::new(Trie::node(&[(0, leaves[2].hash), (5, leaves[5].hash)]))?;

    let node_3 = HashedTrie::new(Trie::node(&[(0, leaves[0].hash), (1, leaves[1].hash)]))?;

    let node_2 = HashedTrie::new(Trie::node(&[(0, node_3.hash), (2, node_4.hash)]))?;

    let node_1 = HashedTrie::new(Trie::node(&[(0, node_2.hash), (255, leaves[3].hash)]))?;

    let root = HashedTrie::new(Trie::node(&[(0, node_1.hash), (251, leaves[4].hash)]))?;

    let root_hash = root.hash;

    let parents = vec![root, node_1, node_2, node_3, node_4];

    let tries = {
        let mut ret = Vec::new();
        ret.extend(leaves);
        ret.extend(parents);
        ret
    };

    Ok((root_hash, tries))
}

fn put_tries<'a, R, S, E>(
    environment: &'a R,
    store: &S,
    tries: &[HashedTestTrie],
) -> Result<(), E>
where
    R: TransactionSource<'a, Handle = S::Handle>,
    S: TrieStore<TestKey, TestValue>,
    S::Error: From<R::Error>,
    E: From<R::Error> + From<S::Error> + From<bytesrepr::Error>,
{
    if tries.is_empty() {
        return Ok(());
    }
    let mut txn = environment.create_read_write_txn()?;
    for HashedTrie { hash, trie } in tries.iter() {
        store.put(&mut txn, hash, trie)?;
    }
    txn.commit()?;
    Ok(())
}

struct LmdbTestContext {
    _temp_dir: TempDir,
    environment: LmdbEnvironment,
    store: LmdbTrieStore,
}

impl LmdbTestContext {
    const TEST_MAP_SIZE: usize = 52_428_800;

    fn new(tries: &[HashedTestTrie]) -> Result<Self, error::Error> {
        let _temp_dir = tempdir().expect("should create temp dir");
        let environment = LmdbEnvironment::new(
            _temp_dir.path(),
            Self::TEST_MAP_SIZE,
            DEFAULT_MAX_READERS,
            true,
        )?;
        let store = LmdbTrieStore::new(&environment, None, DatabaseFlags::empty())?;
        put_tries::<_, _, error::Error>(&environment, &store, tries)?;
        Ok(LmdbTestContext {
            _temp_dir,
            environment,
            store,
        })
    }
}

struct InMemoryTestContext {
    environment: InMemoryEnvironment,
    store: InMemoryTrieStore,
}

impl InMemoryTestContext {
    fn new(tries: &[HashedTestTrie]) -> Result<Self, InMemoryError> {
        let environment = InMemoryEnvironment::new();
        let store = InMemoryTrieStore::new(&environment, None);
        put_tries::<_, _, InMemoryError>(&environment, &store, tries)?;
        Ok(InMemoryTestContext { environment, store })
    }
}

fn check_leaves_exist<T, S, E>(
    txn: &T,
    store: &S,
    root: &Blake2bHash,
    leaves: &[TestTrie],
) -> Result<Vec<bool>, E>
where
    T: Readable<Handle = S::Handle>,
    S: TrieStore<TestKey, TestValue>,
    S::Error: From<T::Error>,
    E: From<S::Error> + From<bytesrepr::Error> + From<super::LookupError>,
{
    let mut ret = Vec::new();

    for leaf in leaves {
        if let Trie::Leaf { key, value } = leaf {
            let result = read::<TestKey, TestValue, _, _, E>(txn, store, root, key)?;
            ret.push(ReadResult::Found(*value) == result);
        } else {
            panic!("leaves should only contain leaves");
        }
    }
    Ok(ret)
}

/// Checks that the expected set of leaves is in the trie at the given state,
/// and that the set of other leaves is not.
fn check_leaves<'a, R, S, E>(
    environment: &'a R,
    store: &S,
    root: &Blake2bHash,
    present: &[TestTrie],
    absent: &[TestTrie],
) -> Result<(), E>
where
    R: TransactionSource<'a, Handle = S::Handle>,
    S: TrieStore<TestKey, TestValue>,
    S::Error: From<R::Error>,
    E: From<R::Error> + From<S::Error> + From<bytesrepr::Error> + From<super::LookupError>,
{
    let txn: R::ReadTransaction = environment.create_read_txn()?;

    assert!(
        check_leaves_exist::<_, _, E>(&txn, store, root, present)?
            .into_iter()
            .all(|b| b)
    );

    assert!(
        check_leaves_exist::<_, _, E>(&txn, store, root, absent)?
            .into_iter()
            .all(|b| !b)
    );

    txn.commit()?;
    Ok(())
}

fn write_leaves<'a, R, S, E>(
    environment: &'a R,
    store: &S,
    root_hash: &Blake2bHash,
    leaves: &[TestTrie],
) -> Result<Vec<WriteResult>, E>
where
    R: TransactionSource<'a, Handle = S::Handle>,
    S: TrieStore<TestKey, TestValue>,
    S::Error: From<R::Error>,
    E: From<R::Error>
        + From<S::Error>
        + From<bytesrepr::Error>
        + From<super::LookupError>
        + From<super::InsertError>,
{
    let mut results = Vec::new();
    if leaves.is_empty() {
        return Ok(results);
    }
    let mut root_hash = root_hash.to_owned();
    let mut txn = environment.create_read_write_txn()?;

    for leaf in leaves.iter() {
        if let Trie::Leaf { key, value } = leaf {
            let write_result = write::<TestKey, TestValue, _, _, E>(
                &mut txn, store, &root_hash, key, value,
            )?;
            match write_result {
                WriteResult::Written(hash) => {
                    root_hash = hash;
                }
                WriteResult::AlreadyExists => (),
                WriteResult::RootNotFound => panic!("write_leaves given an invalid root"),
            };
            results.push(write_result);
        } else {
            panic!("leaves should contain only leaves");
        }
    }
    txn.commit()?;
    Ok(results)
}

/// Writes `test_leaves` to the trie whose root is the last of `states`,
/// asserting that the trie contains exactly the expected leaves after each
/// write. Returns the states extended with each intermediate root.
fn writes_to_n_leaf_empty_trie_had_expected_results<'a, R, S, E>(
    environment: &'a R,
    store: &S,
    states: &[Blake2bHash],
    test_leaves: &[TestTrie],
) -> Result<Vec<Blake2bHash>, E>
where
    R: TransactionSource<'a, Handle = S::Handle>,
    S: TrieStore<TestKey, TestValue>,
    S::Error: From<R::Error>,
    E: From<R::Error>
        + From<S::Error>
        + From<bytesrepr::Error>
        + From<super::LookupError>
        + From<super::InsertError>,
{
    let mut states = states.to_vec();

    // Write set of leaves to the trie
    let hashes = write_leaves::<_, _, E>(
        environment,
        store,
        states.last().expect("states should not be empty"),
        test_leaves,
    )?
    .into_iter()
    .map(|result| match result {
        WriteResult::Written(root_hash) => root_hash,
        _ => panic!("write_leaves resulted in non-write"),
    })
    .collect::<Vec<Blake2bHash>>();

    states.extend(hashes);

    // Check that the expected set of leaves is in the trie at every state,
    // and that the set of other leaves is not.
    for (num_leaves, state) in states.iter().enumerate() {
        let (used, unused) = test_leaves.split_at(num_leaves);
        check_leaves::<_, _, E>(environment, store, state, used, unused)?;
    }

    Ok(states)
}
