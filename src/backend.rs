//! Target backends
//!
//! Backends differ only in surface conventions: file extension, directory
//! layout, identifier casing and type names. The same resolved schema
//! drives every one of them.

use std::fmt;
use std::str::FromStr;

use crate::codegen::ArtifactKind;
use crate::error::SchemagenError;
use crate::naming::{entity_name, to_camel_case, to_pascal_case, to_snake_case};
use crate::schema::{Function, ReturnShape, ScalarKind, Schema};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Backend {
    #[default]
    Java,
    Kotlin,
    CSharp,
    TypeScript,
}

impl Backend {
    pub const ALL: [Backend; 4] = [
        Backend::Java,
        Backend::Kotlin,
        Backend::CSharp,
        Backend::TypeScript,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Backend::Java => "java",
            Backend::Kotlin => "kotlin",
            Backend::CSharp => "csharp",
            Backend::TypeScript => "typescript",
        }
    }

    /// Source file extension (migrations are always `.sql`)
    pub fn extension(&self) -> &'static str {
        match self {
            Backend::Java => "java",
            Backend::Kotlin => "kt",
            Backend::CSharp => "cs",
            Backend::TypeScript => "ts",
        }
    }

    /// Fixed subpackage an artifact kind lands in, relative to its module
    pub fn subpackage(&self, kind: ArtifactKind) -> &'static str {
        match self {
            Backend::CSharp => match kind {
                ArtifactKind::Entity => "Entities",
                ArtifactKind::Dto => "Dtos",
                ArtifactKind::Mapper => "Mappers",
                ArtifactKind::Repository => "Repositories",
                ArtifactKind::ServiceInterface => "Services",
                ArtifactKind::ServiceImpl => "Services/Impl",
                ArtifactKind::EndpointInterface => "Controllers",
                ArtifactKind::EndpointImpl => "Controllers/Impl",
                ArtifactKind::Migration => "Migrations",
                ArtifactKind::ServiceTest => "Tests/Services",
                ArtifactKind::DtoTest => "Tests/Dtos",
                ArtifactKind::EndpointTest => "Tests/Controllers",
                ArtifactKind::IntegrationTest => "Tests/Integration",
            },
            Backend::Java | Backend::Kotlin | Backend::TypeScript => match kind {
                ArtifactKind::Entity => "entity",
                ArtifactKind::Dto => "dto",
                ArtifactKind::Mapper => "mapper",
                ArtifactKind::Repository => "repository",
                ArtifactKind::ServiceInterface => "service",
                ArtifactKind::ServiceImpl => "service/impl",
                ArtifactKind::EndpointInterface => "controller",
                ArtifactKind::EndpointImpl => "controller/impl",
                ArtifactKind::Migration => "migration",
                ArtifactKind::ServiceTest => "test/service",
                ArtifactKind::DtoTest => "test/dto",
                ArtifactKind::EndpointTest => "test/controller",
                ArtifactKind::IntegrationTest => "test/integration",
            },
        }
    }

    pub fn module_segment(&self, raw: &str) -> String {
        match self {
            Backend::CSharp => to_pascal_case(raw),
            _ => to_snake_case(raw),
        }
    }

    /// Field, property and method identifier casing
    pub fn member_name(&self, raw: &str) -> String {
        match self {
            Backend::CSharp => to_pascal_case(raw),
            _ => to_camel_case(raw),
        }
    }

    /// `package`/`namespace` line for a module and subpackage, if the
    /// backend declares one
    pub fn namespace_declaration(&self, module: &str, subpackage: &str) -> Option<String> {
        let dotted = subpackage.replace('/', ".");
        match self {
            Backend::Java => Some(format!("package {}.{};", module, dotted.to_lowercase())),
            Backend::Kotlin => Some(format!("package {}.{}", module, dotted.to_lowercase())),
            Backend::CSharp => Some(format!("namespace {}.{};", module, dotted)),
            Backend::TypeScript => None,
        }
    }

    pub fn type_declaration(&self, interface: bool) -> &'static str {
        match (self, interface) {
            (Backend::Java | Backend::CSharp, false) => "public class",
            (Backend::Java | Backend::CSharp, true) => "public interface",
            (Backend::Kotlin, false) => "class",
            (Backend::Kotlin, true) => "interface",
            (Backend::TypeScript, false) => "export class",
            (Backend::TypeScript, true) => "export interface",
        }
    }

    pub fn field_declaration(&self, name: &str, ty: &str, nullable: bool) -> String {
        match self {
            Backend::Java => format!("private {} {};", ty, name),
            Backend::Kotlin => {
                if nullable {
                    format!("var {}: {}? = null", name, ty)
                } else {
                    format!("var {}: {}", name, ty)
                }
            }
            Backend::CSharp => {
                let marker = if nullable { "?" } else { "" };
                format!("public {}{} {} {{ get; set; }}", ty, marker, name)
            }
            Backend::TypeScript => {
                let marker = if nullable { "?" } else { "" };
                format!("{}{}: {};", name, marker, ty)
            }
        }
    }

    /// Type name a scalar kind maps to
    pub fn scalar_type(&self, kind: &ScalarKind) -> String {
        use ScalarKind::*;

        let name = match (self, kind) {
            (_, Array(inner)) => return self.list_type(&self.scalar_type(inner)),
            (_, Enum(name)) => return to_pascal_case(name),

            (Backend::Java, SmallInt) => "Short",
            (Backend::Java, Integer) => "Integer",
            (Backend::Java, BigInt) => "Long",
            (Backend::Java, Boolean) => "Boolean",
            (Backend::Java, Real) => "Float",
            (Backend::Java, Double) => "Double",
            (Backend::Java, Binary) => "byte[]",
            (Backend::Kotlin, SmallInt) => "Short",
            (Backend::Kotlin, Integer) => "Int",
            (Backend::Kotlin, BigInt) => "Long",
            (Backend::Kotlin, Boolean) => "Boolean",
            (Backend::Kotlin, Real) => "Float",
            (Backend::Kotlin, Double) => "Double",
            (Backend::Kotlin, Binary) => "ByteArray",
            (Backend::Java | Backend::Kotlin, Text | Varchar | Char) => "String",
            (Backend::Java | Backend::Kotlin, Decimal) => "BigDecimal",
            (Backend::Java | Backend::Kotlin, Timestamp) => "LocalDateTime",
            (Backend::Java | Backend::Kotlin, TimestampTz) => "OffsetDateTime",
            (Backend::Java | Backend::Kotlin, Date) => "LocalDate",
            (Backend::Java | Backend::Kotlin, Time) => "LocalTime",
            (Backend::Java | Backend::Kotlin, Uuid) => "UUID",
            (Backend::Java | Backend::Kotlin, Json) => "JsonNode",

            (Backend::CSharp, SmallInt) => "short",
            (Backend::CSharp, Integer) => "int",
            (Backend::CSharp, BigInt) => "long",
            (Backend::CSharp, Boolean) => "bool",
            (Backend::CSharp, Text | Varchar | Char) => "string",
            (Backend::CSharp, Real) => "float",
            (Backend::CSharp, Double) => "double",
            (Backend::CSharp, Decimal) => "decimal",
            (Backend::CSharp, Timestamp) => "DateTime",
            (Backend::CSharp, TimestampTz) => "DateTimeOffset",
            (Backend::CSharp, Date) => "DateOnly",
            (Backend::CSharp, Time) => "TimeOnly",
            (Backend::CSharp, Uuid) => "Guid",
            (Backend::CSharp, Json) => "JsonDocument",
            (Backend::CSharp, Binary) => "byte[]",

            (Backend::TypeScript, SmallInt | Integer | BigInt | Real | Double) => "number",
            (Backend::TypeScript, Boolean) => "boolean",
            (Backend::TypeScript, Text | Varchar | Char | Decimal | Time | Uuid) => "string",
            (Backend::TypeScript, Timestamp | TimestampTz | Date) => "Date",
            (Backend::TypeScript, Json) => "Record<string, unknown>",
            (Backend::TypeScript, Binary) => "Uint8Array",
        };
        name.to_string()
    }

    pub fn list_type(&self, element: &str) -> String {
        match self {
            Backend::TypeScript => format!("{}[]", element),
            _ => format!("List<{}>", element),
        }
    }

    pub fn void_type(&self) -> &'static str {
        match self {
            Backend::Kotlin => "Unit",
            _ => "void",
        }
    }

    /// Data-access method signature synthesized for a stored function
    pub fn function_signature(
        &self,
        schema: &Schema,
        function: &Function,
    ) -> Result<String, SchemagenError> {
        let fail = |message: String| SchemagenError::Function {
            function: function.name.clone(),
            message,
        };

        if function.name.trim().is_empty() {
            return Err(fail("function has no name".to_string()));
        }

        let returns = match &function.returns {
            ReturnShape::Void => self.void_type().to_string(),
            ReturnShape::Scalar(kind) => self.scalar_type(kind),
            ReturnShape::SetOf(table) => match schema.table_by_name(table) {
                Some(t) => self.list_type(&entity_name(&t.name)),
                None => return Err(fail(format!("returns rows of unknown table '{}'", table))),
            },
        };

        let mut params = Vec::with_capacity(function.parameters.len());
        for (i, param) in function.parameters.iter().enumerate() {
            if param.name.trim().is_empty() {
                return Err(fail(format!("parameter {} has no name", i + 1)));
            }
            params.push((to_camel_case(&param.name), self.scalar_type(&param.kind)));
        }

        let method = self.member_name(&function.name);
        let signature = match self {
            Backend::Java | Backend::CSharp => {
                let params: Vec<_> = params.iter().map(|(n, t)| format!("{} {}", t, n)).collect();
                format!("{} {}({})", returns, method, params.join(", "))
            }
            Backend::Kotlin => {
                let params: Vec<_> = params.iter().map(|(n, t)| format!("{}: {}", n, t)).collect();
                format!("fun {}({}): {}", method, params.join(", "), returns)
            }
            Backend::TypeScript => {
                let params: Vec<_> = params.iter().map(|(n, t)| format!("{}: {}", n, t)).collect();
                format!("{}({}): Promise<{}>", method, params.join(", "), returns)
            }
        };

        Ok(signature)
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Backend {
    type Err = SchemagenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "java" => Ok(Backend::Java),
            "kotlin" | "kt" => Ok(Backend::Kotlin),
            "csharp" | "c#" | "cs" | "dotnet" => Ok(Backend::CSharp),
            "typescript" | "ts" => Ok(Backend::TypeScript),
            other => Err(SchemagenError::Config(format!(
                "unknown backend '{}', expected one of java, kotlin, csharp, typescript",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Column, FunctionParam, Table};

    fn schema_with_orders() -> Schema {
        Schema::new(
            "public",
            vec![Table::new("orders", vec![Column::new("id", "bigint").primary_key()], vec![])],
            vec![],
        )
    }

    fn order_total() -> Function {
        Function {
            name: "order_total".to_string(),
            table: Some("orders".to_string()),
            parameters: vec![FunctionParam::new("order_id", "bigint")],
            returns: ReturnShape::Scalar(ScalarKind::Decimal),
        }
    }

    #[test]
    fn test_backend_from_str() {
        assert_eq!("Java".parse::<Backend>().unwrap(), Backend::Java);
        assert_eq!("c#".parse::<Backend>().unwrap(), Backend::CSharp);
        assert_eq!("ts".parse::<Backend>().unwrap(), Backend::TypeScript);
        assert!("cobol".parse::<Backend>().is_err());
    }

    #[test]
    fn test_backend_names_round_trip() {
        for backend in Backend::ALL {
            assert_eq!(backend.name().parse::<Backend>().unwrap(), backend);
        }
    }

    #[test]
    fn test_scalar_types() {
        assert_eq!(Backend::Java.scalar_type(&ScalarKind::BigInt), "Long");
        assert_eq!(Backend::Kotlin.scalar_type(&ScalarKind::Integer), "Int");
        assert_eq!(Backend::CSharp.scalar_type(&ScalarKind::Uuid), "Guid");
        assert_eq!(Backend::TypeScript.scalar_type(&ScalarKind::Decimal), "string");
        assert_eq!(
            Backend::Java.scalar_type(&ScalarKind::Array(Box::new(ScalarKind::Text))),
            "List<String>"
        );
        assert_eq!(
            Backend::TypeScript.scalar_type(&ScalarKind::Array(Box::new(ScalarKind::Integer))),
            "number[]"
        );
        assert_eq!(
            Backend::CSharp.scalar_type(&ScalarKind::Enum("order_status".to_string())),
            "OrderStatus"
        );
    }

    #[test]
    fn test_function_signatures() {
        let schema = schema_with_orders();
        let function = order_total();

        assert_eq!(
            Backend::Java.function_signature(&schema, &function).unwrap(),
            "BigDecimal orderTotal(Long orderId)"
        );
        assert_eq!(
            Backend::Kotlin.function_signature(&schema, &function).unwrap(),
            "fun orderTotal(orderId: Long): BigDecimal"
        );
        assert_eq!(
            Backend::CSharp.function_signature(&schema, &function).unwrap(),
            "decimal OrderTotal(long orderId)"
        );
        assert_eq!(
            Backend::TypeScript.function_signature(&schema, &function).unwrap(),
            "orderTotal(orderId: number): Promise<string>"
        );
    }

    #[test]
    fn test_set_returning_function() {
        let schema = schema_with_orders();
        let function = Function {
            name: "recent_orders".to_string(),
            table: Some("orders".to_string()),
            parameters: vec![],
            returns: ReturnShape::SetOf("orders".to_string()),
        };
        assert_eq!(
            Backend::Java.function_signature(&schema, &function).unwrap(),
            "List<Order> recentOrders()"
        );

        let dangling = Function {
            returns: ReturnShape::SetOf("invoices".to_string()),
            ..function
        };
        let err = Backend::Java.function_signature(&schema, &dangling).unwrap_err();
        assert!(err.to_string().contains("recent_orders"));
        assert!(err.to_string().contains("invoices"));
    }

    #[test]
    fn test_field_declarations() {
        assert_eq!(Backend::Java.field_declaration("name", "String", true), "private String name;");
        assert_eq!(Backend::Kotlin.field_declaration("name", "String", true), "var name: String? = null");
        assert_eq!(
            Backend::CSharp.field_declaration("Name", "string", false),
            "public string Name { get; set; }"
        );
        assert_eq!(Backend::TypeScript.field_declaration("name", "string", true), "name?: string;");
    }
}
