/// Output table descriptor: the name doubles as the directory name under the
/// output root, partition keys appear in the hive layout in declared order.
#[derive(Debug, Clone, Copy)]
pub struct TableSpec {
    pub name: &'static str,
    pub partition_by: &'static [&'static str],
}

pub const SONGS: TableSpec = TableSpec {
    name: "songs",
    partition_by: &["year", "artist_id"],
};

pub const ARTISTS: TableSpec = TableSpec {
    name: "artists",
    partition_by: &[],
};

pub const USERS: TableSpec = TableSpec {
    name: "users",
    partition_by: &[],
};

pub const TIME: TableSpec = TableSpec {
    name: "time",
    partition_by: &["year", "month"],
};

pub const SONGPLAYS: TableSpec = TableSpec {
    name: "songplays",
    partition_by: &["year", "artist_id"],
};

impl TableSpec {
    /// Directory for this table under the output root. The trailing slash
    /// makes listing-table URLs treat the location as a collection even
    /// before it exists.
    pub fn location(&self, output_root: &str) -> String {
        format!("{}/{}/", output_root.trim_end_matches('/'), self.name)
    }

    pub fn partition_columns(&self) -> Vec<String> {
        self.partition_by.iter().map(|c| c.to_string()).collect()
    }
}
