use std::iter::repeat;
use std::path::{Path, PathBuf};

pub fn find_first_subpath<P: AsRef<Path>, F: Fn(&Path) -> bool>(
    root: impl AsRef<Path>,
    subpaths: &[P],
    search: F,
) -> Option<PathBuf> {
    subpaths
        .iter()
        .zip(repeat(root.as_ref()))
        .map(|(b, a)| a.join(b))
        .find(|it: &PathBuf| search(it))
}

/// Stores a list of UUIDs as BSON binary (subtype 4) values, the same
/// representation `bson::serde_helpers::uuid_1_as_binary` uses for single ids.
pub mod uuid_list_as_binary {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use uuid::Uuid;

    pub fn serialize<S: Serializer>(ids: &[Uuid], serializer: S) -> Result<S::Ok, S::Error> {
        ids.iter()
            .map(|id| bson::Uuid::from(*id))
            .collect::<Vec<_>>()
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Uuid>, D::Error> {
        Ok(Vec::<bson::Uuid>::deserialize(deserializer)?
            .into_iter()
            .map(bson::Uuid::to_uuid_1)
            .collect())
    }
}

/// Raw bytes as generic BSON binary instead of an array of integers.
pub mod bytes_as_binary {
    use bson::spec::BinarySubtype;
    use bson::Binary;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        Binary {
            subtype: BinarySubtype::Generic,
            bytes: bytes.to_vec(),
        }
        .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        Ok(Binary::deserialize(deserializer)?.bytes)
    }
}
