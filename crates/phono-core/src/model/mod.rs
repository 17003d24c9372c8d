pub mod catalog;
pub mod info;
pub mod record;

pub use catalog::{Catalog, CatalogAlbum, CatalogArtist, CatalogTrack};
pub use info::{AlbumInfo, ArtistDetails, ArtistInfo, ReleaseDetails, TrackInfo};
pub use record::{AudioFormat, RawRecord};
