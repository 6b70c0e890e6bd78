pub mod serde;

/// Implement `Serialize`/`Deserialize` for a `[u8; N]` newtype: hex strings for
/// human readable formats, raw bytes otherwise.
#[macro_export]
macro_rules! serialize_bytes_newtype {
    ($newtype:ty) => {
        impl serde::Serialize for $newtype {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                $crate::utils::serde::serialize_bytes_array(self.0, serializer)
            }
        }

        impl<'de> serde::de::Deserialize<'de> for $newtype {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                $crate::utils::serde::deserialize_bytes_array(deserializer).map(Self)
            }
        }
    };
}
