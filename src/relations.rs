//! Relationship inference
//!
//! Derives, from the raw foreign-key graph, the three relationship classes
//! each entity table participates in: many-to-one (the table owns the FK),
//! one-to-many (another non-junction table points here) and many-to-many
//! (reached through a two-FK junction table).
//!
//! Relationships are value objects produced fresh per run and handed to
//! emitters read-only.

use indexmap::IndexMap;
use tracing::trace;

use crate::schema::{ForeignKey, Schema, Table};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationKind {
    /// `source.column` references `target.referenced_column`
    ManyToOne {
        column: String,
        referenced_column: String,
    },
    /// `target.column` references `source.referenced_column`
    OneToMany {
        column: String,
        referenced_column: String,
    },
    /// `junction.this_key` references `source`, `junction.other_key`
    /// references `target`
    ManyToMany {
        junction: String,
        this_key: String,
        other_key: String,
    },
}

/// A directed relationship as seen from `source`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub source: String,
    pub target: String,
    pub kind: RelationKind,
}

impl Relationship {
    fn many_to_one(schema: &Schema, table: &Table, fk: &ForeignKey) -> Self {
        Self {
            source: table.name.clone(),
            target: fk.referenced_table.clone(),
            kind: RelationKind::ManyToOne {
                column: fk.column.clone(),
                referenced_column: schema.referenced_column(fk),
            },
        }
    }

    /// The same edge seen from the referenced side; only many-to-one edges
    /// have an inverse
    pub fn inverse(&self) -> Option<Relationship> {
        match &self.kind {
            RelationKind::ManyToOne {
                column,
                referenced_column,
            } => Some(Relationship {
                source: self.target.clone(),
                target: self.source.clone(),
                kind: RelationKind::OneToMany {
                    column: column.clone(),
                    referenced_column: referenced_column.clone(),
                },
            }),
            _ => None,
        }
    }

    pub fn is_self_referential(&self) -> bool {
        self.source == self.target
    }
}

/// Resolved relationship sets for one entity table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityRelations {
    pub outgoing: Vec<Relationship>,
    pub incoming: Vec<Relationship>,
    pub many_to_many: Vec<Relationship>,
}

/// All direct FK edges of a schema, grouped by declaring table
pub struct RelationshipGraph<'a> {
    schema: &'a Schema,
    by_source: IndexMap<&'a str, Vec<Relationship>>,
}

impl<'a> RelationshipGraph<'a> {
    pub fn build(schema: &'a Schema) -> Self {
        let mut by_source: IndexMap<&'a str, Vec<Relationship>> = IndexMap::new();
        for table in schema.tables() {
            for fk in table.foreign_keys() {
                by_source
                    .entry(table.name.as_str())
                    .or_default()
                    .push(Relationship::many_to_one(schema, table, fk));
            }
        }
        trace!(
            sources = by_source.len(),
            edges = by_source.values().map(Vec::len).sum::<usize>(),
            "Built relationship graph"
        );
        Self { schema, by_source }
    }

    /// Every direct FK edge, junction-owned ones included
    pub fn all(&self) -> impl Iterator<Item = &Relationship> {
        self.by_source.values().flatten()
    }

    /// Foreign keys declared on the table itself
    pub fn outgoing(&self, table: &str) -> Vec<Relationship> {
        self.by_source.get(table).cloned().unwrap_or_default()
    }

    /// Foreign keys on non-junction tables that reference this table, seen
    /// from this table. Self-references are included.
    pub fn incoming(&self, table: &str) -> Vec<Relationship> {
        self.all()
            .filter(|rel| rel.target == table)
            .filter(|rel| {
                !self
                    .schema
                    .table_by_name(&rel.source)
                    .is_some_and(Table::is_junction)
            })
            .filter_map(Relationship::inverse)
            .collect()
    }

    /// Associations reached through junction tables. A junction whose two
    /// keys both reference this table yields two entries, one per direction.
    pub fn many_to_many(&self, table: &str) -> Vec<Relationship> {
        let mut relations = Vec::new();

        for junction in self.schema.junction_tables() {
            let [first, second] = junction.foreign_keys() else {
                continue;
            };

            for (mine, theirs) in [(first, second), (second, first)] {
                if mine.referenced_table != table {
                    continue;
                }
                let opposite = match self.schema.table_by_name(&theirs.referenced_table) {
                    Some(t) if !t.is_junction() => t,
                    _ => {
                        trace!(
                            junction = ?junction.name,
                            target = ?theirs.referenced_table,
                            "Skipping junction with unresolved opposite table"
                        );
                        continue;
                    }
                };
                relations.push(Relationship {
                    source: table.to_string(),
                    target: opposite.name.clone(),
                    kind: RelationKind::ManyToMany {
                        junction: junction.name.clone(),
                        this_key: mine.column.clone(),
                        other_key: theirs.column.clone(),
                    },
                });
            }
        }

        relations
    }

    pub fn for_table(&self, table: &str) -> EntityRelations {
        let relations = EntityRelations {
            outgoing: self.outgoing(table),
            incoming: self.incoming(table),
            many_to_many: self.many_to_many(table),
        };
        trace!(
            table = ?table,
            outgoing = relations.outgoing.len(),
            incoming = relations.incoming.len(),
            many_to_many = relations.many_to_many.len(),
            "Resolved relationships"
        );
        relations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Column;

    fn id() -> Column {
        Column::new("id", "bigint").primary_key()
    }

    fn entity(name: &str) -> Table {
        Table::new(name, vec![id(), Column::new("name", "text")], vec![])
    }

    fn bridge(name: &str, a: (&str, &str), b: (&str, &str)) -> Table {
        Table::new(
            name,
            vec![Column::new(a.0, "bigint"), Column::new(b.0, "bigint")],
            vec![ForeignKey::new(a.0, a.1), ForeignKey::new(b.0, b.1)],
        )
    }

    fn shop() -> Schema {
        Schema::new(
            "public",
            vec![
                entity("products"),
                entity("categories"),
                bridge(
                    "product_categories",
                    ("product_id", "products"),
                    ("category_id", "categories"),
                ),
            ],
            vec![],
        )
    }

    #[test]
    fn test_many_to_many_scenario() {
        let schema = shop();
        let graph = RelationshipGraph::build(&schema);

        assert_eq!(
            graph.many_to_many("products"),
            vec![Relationship {
                source: "products".to_string(),
                target: "categories".to_string(),
                kind: RelationKind::ManyToMany {
                    junction: "product_categories".to_string(),
                    this_key: "product_id".to_string(),
                    other_key: "category_id".to_string(),
                },
            }]
        );
    }

    #[test]
    fn test_many_to_many_is_symmetric() {
        let schema = shop();
        let graph = RelationshipGraph::build(&schema);

        let back = graph.many_to_many("categories");
        assert_eq!(back.len(), 1);
        assert_eq!(back[0].target, "products");
        assert_eq!(
            back[0].kind,
            RelationKind::ManyToMany {
                junction: "product_categories".to_string(),
                this_key: "category_id".to_string(),
                other_key: "product_id".to_string(),
            }
        );
    }

    #[test]
    fn test_junction_keys_are_not_inverse_relations() {
        let schema = shop();
        let graph = RelationshipGraph::build(&schema);

        assert!(graph.incoming("products").is_empty());
        assert!(graph.incoming("categories").is_empty());
        // The edges still exist in the raw graph
        assert_eq!(graph.outgoing("product_categories").len(), 2);
    }

    #[test]
    fn test_outgoing_and_incoming() {
        let schema = Schema::new(
            "public",
            vec![
                entity("customers"),
                Table::new(
                    "orders",
                    vec![id(), Column::new("customer_id", "bigint")],
                    vec![ForeignKey::new("customer_id", "customers")],
                ),
            ],
            vec![],
        );
        let graph = RelationshipGraph::build(&schema);

        let outgoing = graph.outgoing("orders");
        assert_eq!(outgoing.len(), 1);
        assert_eq!(outgoing[0].target, "customers");
        assert_eq!(
            outgoing[0].kind,
            RelationKind::ManyToOne {
                column: "customer_id".to_string(),
                referenced_column: "id".to_string(),
            }
        );

        let incoming = graph.incoming("customers");
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].source, "customers");
        assert_eq!(incoming[0].target, "orders");
        assert!(matches!(incoming[0].kind, RelationKind::OneToMany { .. }));

        assert!(graph.outgoing("customers").is_empty());
    }

    #[test]
    fn test_self_referential_many_to_many_yields_both_directions() {
        let schema = Schema::new(
            "public",
            vec![
                entity("users"),
                bridge(
                    "friendships",
                    ("user_id", "users"),
                    ("friend_id", "users"),
                ),
            ],
            vec![],
        );
        let graph = RelationshipGraph::build(&schema);

        let relations = graph.many_to_many("users");
        assert_eq!(relations.len(), 2);
        assert!(relations.iter().all(Relationship::is_self_referential));
        let keys: Vec<_> = relations
            .iter()
            .map(|rel| match &rel.kind {
                RelationKind::ManyToMany {
                    this_key, other_key, ..
                } => (this_key.as_str(), other_key.as_str()),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(keys, vec![("user_id", "friend_id"), ("friend_id", "user_id")]);
    }

    #[test]
    fn test_self_foreign_key_is_both_outgoing_and_incoming() {
        let schema = Schema::new(
            "public",
            vec![Table::new(
                "employees",
                vec![id(), Column::new("manager_id", "bigint")],
                vec![ForeignKey::new("manager_id", "employees")],
            )],
            vec![],
        );
        let graph = RelationshipGraph::build(&schema);

        assert_eq!(graph.outgoing("employees").len(), 1);
        assert_eq!(graph.incoming("employees").len(), 1);
        assert!(graph.many_to_many("employees").is_empty());
    }

    #[test]
    fn test_junction_to_missing_table_is_skipped() {
        let schema = Schema::new(
            "public",
            vec![
                entity("products"),
                bridge(
                    "product_labels",
                    ("product_id", "products"),
                    ("label_id", "labels"),
                ),
            ],
            vec![],
        );
        let graph = RelationshipGraph::build(&schema);
        assert!(graph.many_to_many("products").is_empty());
    }

    #[test]
    fn test_unrelated_junction_is_ignored() {
        let schema = Schema::new(
            "public",
            vec![
                entity("products"),
                entity("users"),
                entity("groups"),
                bridge(
                    "memberships",
                    ("user_id", "users"),
                    ("group_id", "groups"),
                ),
            ],
            vec![],
        );
        let graph = RelationshipGraph::build(&schema);
        let relations = graph.for_table("products");
        assert_eq!(relations, EntityRelations::default());
    }
}
