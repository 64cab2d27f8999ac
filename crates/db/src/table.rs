use sea_query::Iden;

#[derive(Iden, Clone)]
pub enum Category {
    Table,
    Id,
    Name,
    NameKey,
    Icon,
    DisplayOrder,
    Description,
    CreatedAt,
}

#[derive(Iden, Clone)]
pub enum Ingredient {
    Table,
    Id,
    Name,
    NameKey,
    CategoryId,
    Subcategory,
    DefaultUnit,
    MinWeight,
    MaxWeight,
    PostBake,
    Phase,
    Season,
    Allergens,
    Tags,
    IsCustom,
    DateAdded,
}

#[derive(Iden, Clone)]
pub enum Preparation {
    Table,
    Id,
    Name,
    CategoryId,
    Description,
    Yield,
    PrepTime,
    Difficulty,
    Ingredients,
    Instructions,
    Tips,
    Tags,
    IsCustom,
    DateAdded,
}

#[derive(Iden, Clone)]
pub enum Recipe {
    Table,
    Id,
    Name,
    Description,
    BaseIngredients,
    Preparations,
    ToppingsDuringBake,
    ToppingsPostBake,
    Tags,
    ArchetypeUsed,
    RecipeSource,
    ImageUrl,
    UserId,
    CreatedAt,
}
